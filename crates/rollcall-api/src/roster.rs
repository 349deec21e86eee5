//! Roster CRUD handlers (students, sections, faculty)

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use rollcall_core::db::{Connection, RosterRepository, SqliteRosterRepository, StudentUpdate};
use rollcall_core::models::{Faculty, FacultyId, Section, SectionId, Student, StudentId};
use rollcall_core::util::normalize_text_option;

use crate::auth::AuthenticatedFaculty;
use crate::error::AppError;
use crate::routes::{faculty_fingerprint, AppState};

const LIST_DEFAULT_LIMIT: usize = 50;
const LIST_MAX_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudentRequest {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    section_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudentRequest {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    section_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    section_id: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSectionRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    faculty_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFacultyRequest {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeactivatedResponse {
    deactivated: bool,
}

/// POST /v1/students
pub async fn create_student(
    State(state): State<AppState>,
    Extension(faculty): Extension<AuthenticatedFaculty>,
    Json(request): Json<CreateStudentRequest>,
) -> Result<Json<Student>, AppError> {
    let full_name = normalize_text_option(request.full_name)
        .ok_or_else(|| AppError::bad_request("fullName must be a non-empty string"))?;
    let section_id = parse_section_id(request.section_id)?;

    let conn = connect(&state)?;
    let repo = SqliteRosterRepository::new(&conn);

    require_section(&repo, &section_id).await?;

    let student = Student::new(full_name, section_id);
    repo.insert_student(&student).await?;

    tracing::info!(
        endpoint = "create_student",
        faculty = faculty_fingerprint(&faculty.faculty_id),
        "Created student"
    );
    Ok(Json(student))
}

/// GET /v1/students
pub async fn list_students(
    State(state): State<AppState>,
    Extension(_faculty): Extension<AuthenticatedFaculty>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Student>>, AppError> {
    let section_id = query
        .section_id
        .map(|raw| {
            raw.parse::<SectionId>()
                .map_err(|_| AppError::bad_request("sectionId is not a valid UUID"))
        })
        .transpose()?;

    let conn = connect(&state)?;
    let repo = SqliteRosterRepository::new(&conn);

    let students = repo
        .list_students(
            section_id.as_ref(),
            query.limit.unwrap_or(LIST_DEFAULT_LIMIT).min(LIST_MAX_LIMIT),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(students))
}

/// GET /v1/students/{id}
pub async fn get_student(
    State(state): State<AppState>,
    Extension(_faculty): Extension<AuthenticatedFaculty>,
    Path(id): Path<String>,
) -> Result<Json<Student>, AppError> {
    let id: StudentId = id
        .parse()
        .map_err(|_| AppError::bad_request("student id is not a valid UUID"))?;

    let conn = connect(&state)?;
    let repo = SqliteRosterRepository::new(&conn);

    let student = repo
        .find_student(&id)
        .await?
        .ok_or_else(|| AppError::not_found(id.to_string()))?;
    Ok(Json(student))
}

/// PUT /v1/students/{id}
pub async fn update_student(
    State(state): State<AppState>,
    Extension(faculty): Extension<AuthenticatedFaculty>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStudentRequest>,
) -> Result<Json<Student>, AppError> {
    let id: StudentId = id
        .parse()
        .map_err(|_| AppError::bad_request("student id is not a valid UUID"))?;

    let full_name = normalize_text_option(request.full_name);
    let section_id = request
        .section_id
        .map(|raw| {
            raw.parse::<SectionId>()
                .map_err(|_| AppError::bad_request("sectionId is not a valid UUID"))
        })
        .transpose()?;

    if full_name.is_none() && section_id.is_none() {
        return Err(AppError::bad_request(
            "at least one of fullName or sectionId must be provided",
        ));
    }

    let conn = connect(&state)?;
    let repo = SqliteRosterRepository::new(&conn);

    if let Some(section_id) = &section_id {
        require_section(&repo, section_id).await?;
    }

    let student = repo
        .update_student(
            &id,
            StudentUpdate {
                full_name,
                section_id,
            },
        )
        .await?;

    tracing::info!(
        endpoint = "update_student",
        faculty = faculty_fingerprint(&faculty.faculty_id),
        "Updated student"
    );
    Ok(Json(student))
}

/// DELETE /v1/students/{id}
///
/// Deactivates rather than deletes; ledger history stays intact.
pub async fn deactivate_student(
    State(state): State<AppState>,
    Extension(faculty): Extension<AuthenticatedFaculty>,
    Path(id): Path<String>,
) -> Result<Json<DeactivatedResponse>, AppError> {
    let id: StudentId = id
        .parse()
        .map_err(|_| AppError::bad_request("student id is not a valid UUID"))?;

    let conn = connect(&state)?;
    let repo = SqliteRosterRepository::new(&conn);
    repo.deactivate_student(&id).await?;

    tracing::info!(
        endpoint = "deactivate_student",
        faculty = faculty_fingerprint(&faculty.faculty_id),
        "Deactivated student"
    );
    Ok(Json(DeactivatedResponse { deactivated: true }))
}

/// POST /v1/sections
pub async fn create_section(
    State(state): State<AppState>,
    Extension(faculty): Extension<AuthenticatedFaculty>,
    Json(request): Json<CreateSectionRequest>,
) -> Result<Json<Section>, AppError> {
    let name = normalize_text_option(request.name)
        .ok_or_else(|| AppError::bad_request("name must be a non-empty string"))?;
    let owner_id: FacultyId = normalize_text_option(request.faculty_id)
        .ok_or_else(|| AppError::bad_request("facultyId must be a non-empty string"))?
        .parse()
        .map_err(|_| AppError::bad_request("facultyId is not a valid UUID"))?;

    let conn = connect(&state)?;
    let repo = SqliteRosterRepository::new(&conn);

    if repo.find_faculty(&owner_id).await?.is_none() {
        return Err(AppError::bad_request(
            "facultyId does not reference a known faculty member",
        ));
    }

    let section = Section::new(name, owner_id);
    repo.insert_section(&section).await?;

    tracing::info!(
        endpoint = "create_section",
        faculty = faculty_fingerprint(&faculty.faculty_id),
        "Created section"
    );
    Ok(Json(section))
}

/// GET /v1/sections
pub async fn list_sections(
    State(state): State<AppState>,
    Extension(_faculty): Extension<AuthenticatedFaculty>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Section>>, AppError> {
    let conn = connect(&state)?;
    let repo = SqliteRosterRepository::new(&conn);

    let sections = repo
        .list_sections(
            query.limit.unwrap_or(LIST_DEFAULT_LIMIT).min(LIST_MAX_LIMIT),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(Json(sections))
}

/// POST /v1/faculty
pub async fn create_faculty(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedFaculty>,
    Json(request): Json<CreateFacultyRequest>,
) -> Result<Json<Faculty>, AppError> {
    let full_name = normalize_text_option(request.full_name)
        .ok_or_else(|| AppError::bad_request("fullName must be a non-empty string"))?;
    let email = normalize_text_option(request.email)
        .ok_or_else(|| AppError::bad_request("email must be a non-empty string"))?;
    if !email.contains('@') {
        return Err(AppError::bad_request("email is not a valid address"));
    }

    let conn = connect(&state)?;
    let repo = SqliteRosterRepository::new(&conn);

    let faculty = Faculty::new(full_name, email);
    repo.insert_faculty(&faculty).await.map_err(|error| {
        if error.to_string().contains("UNIQUE") {
            AppError::bad_request("email is already registered")
        } else {
            error.into()
        }
    })?;

    tracing::info!(
        endpoint = "create_faculty",
        caller = faculty_fingerprint(&caller.faculty_id),
        "Created faculty member"
    );
    Ok(Json(faculty))
}

/// GET /v1/faculty/{id}
pub async fn get_faculty(
    State(state): State<AppState>,
    Extension(_caller): Extension<AuthenticatedFaculty>,
    Path(id): Path<String>,
) -> Result<Json<Faculty>, AppError> {
    let id: FacultyId = id
        .parse()
        .map_err(|_| AppError::bad_request("faculty id is not a valid UUID"))?;

    let conn = connect(&state)?;
    let repo = SqliteRosterRepository::new(&conn);

    let faculty = repo
        .find_faculty(&id)
        .await?
        .ok_or_else(|| AppError::not_found(id.to_string()))?;
    Ok(Json(faculty))
}

fn connect(state: &AppState) -> Result<Connection, AppError> {
    state
        .db
        .connect()
        .map_err(|error| AppError::internal(format!("store unavailable: {error}")))
}

fn parse_section_id(raw: Option<String>) -> Result<SectionId, AppError> {
    normalize_text_option(raw)
        .ok_or_else(|| AppError::bad_request("sectionId must be a non-empty string"))?
        .parse()
        .map_err(|_| AppError::bad_request("sectionId is not a valid UUID"))
}

async fn require_section(
    repo: &SqliteRosterRepository<'_>,
    section_id: &SectionId,
) -> Result<(), AppError> {
    if repo.find_section(section_id).await?.is_none() {
        return Err(AppError::bad_request(
            "sectionId does not reference a known section",
        ));
    }
    Ok(())
}
