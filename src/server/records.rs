use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::auth::{RequireAdmin, RequireAuth};
use crate::error::Error;
use crate::photos::{self, PhotoStorageError};
use crate::server::AppState;
use crate::server::audit::record_action;
use crate::server::dto::{CreateRecordRequest, OverrideMeasurementRequest, UpdateRecordRequest};
use crate::server::locations::resolve_measurements;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_contract_group;
use crate::types::{Location, PhotoPhase, ServiceRecord};

const DELETED_OPERATOR_LABEL: &str = "Deleted operator";

pub async fn list_records(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut records = state
        .store
        .list_records()
        .api_err("Failed to list records")?;

    for detail in &mut records {
        if detail.record.operator_name.is_empty() {
            detail.record.operator_name = DELETED_OPERATOR_LABEL.to_string();
        }
    }

    Ok(Json(ApiResponse::success(records)))
}

pub async fn get_record(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut detail = state
        .store
        .get_record_detail(&id)
        .api_err("Failed to get record")?
        .or_not_found("Record not found")?;

    if detail.record.operator_name.is_empty() {
        detail.record.operator_name = DELETED_OPERATOR_LABEL.to_string();
    }

    Ok(Json(ApiResponse::success(detail)))
}

pub async fn create_record(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRecordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let contract_group = validate_contract_group(&req.contract_group)?;

    let operator = state
        .store
        .get_user(&req.operator_id)
        .api_err("Failed to get operator")?
        .or_not_found("Operator not found")?;

    let service = state
        .store
        .get_service(&req.service_id)
        .api_err("Failed to get service")?
        .or_not_found("Service not found")?;

    // Inline location creation comes first so the record can reference it.
    let mut location_id = req.location_id.clone();
    if let Some(info) = &req.new_location_info {
        if info.name.trim().is_empty() {
            return Err(ApiError::bad_request("New location name is required"));
        }
        let city = validate_contract_group(&info.contract_group)?;
        let (pairs, _details) = resolve_measurements(&state, &info.services).await?;

        let location = Location {
            id: Uuid::new_v4().to_string(),
            city,
            name: info.name.trim().to_string(),
            lat: info.lat,
            lng: info.lng,
            observations: info.observations.clone(),
            is_group: false,
            parent_id: None,
        };

        state
            .store
            .create_location(&location, &pairs)
            .api_err("Failed to create location")?;
        location_id = Some(location.id);
    } else if let Some(id) = &location_id {
        // Never write a record pointing at a location that does not resolve.
        state
            .store
            .get_location(id)
            .api_err("Failed to get location")?
            .or_not_found("Location not found")?;
    }

    let record = ServiceRecord {
        id: Uuid::new_v4().to_string(),
        operator_id: Some(operator.id.clone()),
        operator_name: operator.name.clone(),
        service_id: service.id,
        contract_group,
        location_name: req.location_name.trim().to_string(),
        location_area: req.location_area,
        override_measurement: None,
        gps_used: req.gps_used,
        start_time: req.start_time,
        end_time: None,
        before_photos: Vec::new(),
        after_photos: Vec::new(),
        location_id,
    };

    state
        .store
        .create_record(&record)
        .api_err("Failed to create record")?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(record))))
}

pub async fn update_record(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRecordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut record = state
        .store
        .get_record(&id)
        .api_err("Failed to get record")?
        .or_not_found("Record not found")?;

    if let Some(service_id) = req.service_id {
        state
            .store
            .get_service(&service_id)
            .api_err("Failed to get service")?
            .or_not_found("Service not found")?;
        record.service_id = service_id;
    }
    if let Some(contract_group) = &req.contract_group {
        record.contract_group = validate_contract_group(contract_group)?;
    }
    if let Some(location_name) = req.location_name {
        record.location_name = location_name;
    }
    if let Some(location_area) = req.location_area {
        record.location_area = location_area;
    }
    if let Some(gps_used) = req.gps_used {
        record.gps_used = gps_used;
    }
    if let Some(start_time) = req.start_time {
        record.start_time = start_time;
    }
    if let Some(end_time) = req.end_time {
        record.end_time = Some(end_time);
    }
    if let Some(before_photos) = req.before_photos {
        record.before_photos = before_photos;
    }
    if let Some(after_photos) = req.after_photos {
        record.after_photos = after_photos;
    }

    state
        .store
        .update_record(&record)
        .api_err("Failed to update record")?;

    Ok(Json(ApiResponse::success(record)))
}

pub async fn override_measurement(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<OverrideMeasurementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(value) = req.override_measurement else {
        return Err(ApiError::bad_request("Adjusted measurement is required"));
    };

    let mut record = state
        .store
        .get_record(&id)
        .api_err("Failed to get record")?
        .or_not_found("Record not found")?;

    let old_effective = record.effective_measurement();

    state
        .store
        .set_override_measurement(&id, value)
        .api_err("Failed to update measurement")?;

    record.override_measurement = value;
    let new_effective = record.effective_measurement();

    record_action(
        &state,
        &admin,
        "MEASUREMENT_OVERRIDDEN",
        Some(record.id.clone()),
        format!(
            "Measurement for record at '{}' changed from {old_effective} to {new_effective}",
            record.location_name
        ),
    );

    Ok(Json(ApiResponse::success(record)))
}

pub async fn upload_photos(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut phase: Option<PhotoPhase> = None;
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {e}")))?
    {
        match field.name() {
            Some("phase") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read phase: {e}")))?;
                phase = Some(PhotoPhase::from_str(text.trim()).map_err(|e| match e {
                    Error::Validation(msg) => ApiError::bad_request(msg),
                    _ => ApiError::bad_request("Invalid phase"),
                })?);
            }
            Some("files") => {
                let name = field.file_name().unwrap_or("photo").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
                files.push((name, data.to_vec()));
            }
            _ => {}
        }
    }

    let phase = phase.ok_or_else(|| ApiError::bad_request("Phase field is required"))?;
    if files.is_empty() {
        return Err(ApiError::bad_request("At least one file is required"));
    }

    let mut paths = Vec::with_capacity(files.len());
    for (name, data) in &files {
        match state.photos.save(phase, name, data).await {
            Ok(path) => paths.push(path),
            Err(e) => {
                tracing::error!("Failed to store uploaded photo: {e}");
                state.photos.delete_all_best_effort(&paths).await;
                return Err(ApiError::internal("Failed to store uploaded photo"));
            }
        }
    }

    match state.store.append_photos(&id, phase, &paths) {
        Ok(record) => Ok(Json(ApiResponse::success(record))),
        Err(Error::NotFound) => {
            // The files were already persisted; remove them rather than leave
            // orphans pointing at a record that does not exist.
            state.photos.delete_all_best_effort(&paths).await;
            Err(ApiError::not_found("Record not found for photo upload"))
        }
        Err(_) => {
            state.photos.delete_all_best_effort(&paths).await;
            Err(ApiError::internal("Failed to attach photos"))
        }
    }
}

pub async fn delete_record(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .store
        .get_record(&id)
        .api_err("Failed to get record")?
        .or_not_found("Record not found")?;

    // Artifacts first, best-effort; then the row; then the audit trail.
    let mut all_photos = record.before_photos.clone();
    all_photos.extend(record.after_photos.iter().cloned());
    state.photos.delete_all_best_effort(&all_photos).await;

    state
        .store
        .delete_record(&record.id)
        .api_err("Failed to delete record")?;

    record_action(
        &state,
        &admin,
        "RECORD_DELETED",
        Some(record.id.clone()),
        format!(
            "Deleted record at '{}' ({}) with {} photo(s)",
            record.location_name,
            record.contract_group,
            all_photos.len()
        ),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn serve_photo(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let public_path = format!("{}{file}", photos::PUBLIC_PREFIX);

    let bytes = state.photos.read(&public_path).await.map_err(|e| match e {
        PhotoStorageError::NotFound => ApiError::not_found("Photo not found"),
        PhotoStorageError::InvalidPath => ApiError::bad_request("Invalid photo path"),
        PhotoStorageError::Io(_) => ApiError::internal("Failed to read photo"),
    })?;

    let content_type = photos::content_type_for(&public_path);
    Ok(([(CONTENT_TYPE, content_type)], bytes))
}
