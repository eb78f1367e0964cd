use std::future::Future;

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::SubmitError,
    identity::Principal,
    records::{ANONYMOUS, MaintenanceRequest, NOT_ASSIGNED, Record, RectorComplaint, Status},
    store::{Collection, Document, DocumentStore, StoreError, sort_newest_first},
};

fn non_blank(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

/// Files a maintenance request for `principal`.
///
/// A blank `display_name` falls back to the principal's own display name and
/// then to "Anonymous"; a blank `room` to "Not Assigned". One call, one
/// document: there is no retry and no deduplication.
pub async fn submit_request(
    store: &DocumentStore,
    principal: Option<&Principal>,
    service_type: &str,
    description: &str,
    display_name: &str,
    room: &str,
) -> Result<String, SubmitError> {
    let principal = principal.ok_or(SubmitError::NotAuthenticated)?;
    let service_type = non_blank(service_type).ok_or(SubmitError::Invalid("service type"))?;

    let username = non_blank(display_name)
        .or_else(|| principal.display_name.as_deref().and_then(non_blank))
        .unwrap_or(ANONYMOUS);

    let request = MaintenanceRequest {
        uid: principal.uid.clone(),
        username: username.to_owned(),
        room: non_blank(room).unwrap_or(NOT_ASSIGNED).to_owned(),
        service_type: service_type.to_owned(),
        description: description.trim().to_owned(),
        status: Status::Pending,
        timestamp: None,
    };
    let id = store.create_document(MaintenanceRequest::COLLECTION, request.into_fields()).await?;

    info!("u/{} filed request {id} ({service_type})", principal.uid);
    Ok(id)
}

pub async fn submit_complaint(
    store: &DocumentStore,
    principal: Option<&Principal>,
    complaint_type: &str,
    description: &str,
) -> Result<String, SubmitError> {
    let principal = principal.ok_or(SubmitError::NotAuthenticated)?;
    let complaint_type = non_blank(complaint_type).ok_or(SubmitError::Invalid("complaint type"))?;

    let complaint = RectorComplaint {
        uid: principal.uid.clone(),
        complaint_type: complaint_type.to_owned(),
        description: description.trim().to_owned(),
        status: Status::Submitted,
        timestamp: None,
    };
    let id = store.create_document(RectorComplaint::COLLECTION, complaint.into_fields()).await?;

    info!("u/{} filed complaint {id} ({complaint_type})", principal.uid);
    Ok(id)
}

/// The requests filed by `uid`, newest first.
pub async fn user_requests(store: &DocumentStore, uid: &str) -> Result<Vec<Document>, StoreError> {
    let mut docs = store.query_by_field(Collection::Requests, "uid", &uid.into()).await?;
    sort_newest_first(&mut docs);
    Ok(docs)
}

pub async fn all_requests(store: &DocumentStore) -> Result<Vec<Document>, StoreError> {
    let mut docs = store.list_documents(Collection::Requests).await?;
    sort_newest_first(&mut docs);
    Ok(docs)
}

pub async fn all_rector_complaints(store: &DocumentStore) -> Result<Vec<Document>, StoreError> {
    let mut docs = store.list_documents(Collection::RectorComplaints).await?;
    sort_newest_first(&mut docs);
    Ok(docs)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub is_complaint: bool,
    #[serde(flatten)]
    pub document: Document,
}

/// Everything anyone has filed, newest first.
pub async fn public_log(store: &DocumentStore) -> Vec<LogEntry> {
    merge_log(all_requests(store), all_rector_complaints(store)).await
}

/// Runs both fetches at once and merges whatever succeeded. A failed branch
/// is logged and left out; it never hides the other one.
pub async fn merge_log<R, C>(requests: R, complaints: C) -> Vec<LogEntry>
where
    R: Future<Output = Result<Vec<Document>, StoreError>>,
    C: Future<Output = Result<Vec<Document>, StoreError>>,
{
    let (requests, complaints) = tokio::join!(requests, complaints);

    let mut entries = Vec::new();
    match requests {
        Ok(docs) => entries.extend(docs.into_iter().map(|document| LogEntry { is_complaint: false, document })),
        Err(e) => warn!("public log: requests unavailable: {e}"),
    }
    match complaints {
        Ok(docs) => entries.extend(docs.into_iter().map(|document| LogEntry { is_complaint: true, document })),
        Err(e) => warn!("public log: rector complaints unavailable: {e}"),
    }

    entries.sort_by(|a, b| b.document.timestamp().cmp(&a.document.timestamp()));
    entries
}
