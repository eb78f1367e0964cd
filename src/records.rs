use std::fmt;

use serde::Serialize;

use crate::store::{Collection, Document, FieldValue, Fields, Timestamp};

pub const ANONYMOUS: &str = "Anonymous";
pub const NOT_ASSIGNED: &str = "Not Assigned";

/// Where a submission stands. Residents only ever create `Pending` requests
/// and `Submitted` complaints; everything after that is set by staff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Status {
    Pending,
    Submitted,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Pending => "Pending",
            Status::Submitted => "Submitted",
            Status::Other(s) => s,
        }
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => Status::Pending,
            "Submitted" => Status::Submitted,
            other => Status::Other(other.to_owned()),
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.as_str().to_owned()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed view over one collection's documents.
///
/// Reading is lenient: missing or mistyped fields fall back to defaults so a
/// document written by another client never fails to load.
pub trait Record: Sized {
    const COLLECTION: Collection;

    fn into_fields(self) -> Fields;
    fn from_document(doc: &Document) -> Self;
}

fn text(doc: &Document, field: &str) -> String {
    doc.get_str(field).unwrap_or_default().to_owned()
}

fn optional_timestamp(doc: &Document, field: &str) -> Option<Timestamp> {
    doc.get(field).and_then(FieldValue::as_timestamp)
}

fn stamp(fields: &mut Fields, field: &str, at: Option<Timestamp>) {
    let value = at.map_or(FieldValue::ServerTimestamp, FieldValue::Timestamp);
    fields.insert(field.to_owned(), value);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub username: String,
    pub hostel: String,
    pub room: String,
    pub created_at: Option<Timestamp>,
}

impl Record for UserProfile {
    const COLLECTION: Collection = Collection::Users;

    fn into_fields(self) -> Fields {
        let mut fields = crate::fields! {
            "uid" => self.uid,
            "email" => self.email,
            "username" => self.username,
            "hostel" => self.hostel,
            "room" => self.room,
        };
        stamp(&mut fields, "createdAt", self.created_at);
        fields
    }

    fn from_document(doc: &Document) -> Self {
        Self {
            uid: doc.get_str("uid").unwrap_or(&doc.id).to_owned(),
            email: text(doc, "email"),
            username: text(doc, "username"),
            hostel: text(doc, "hostel"),
            room: text(doc, "room"),
            created_at: optional_timestamp(doc, "createdAt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceRequest {
    pub uid: String,
    pub username: String,
    pub room: String,
    pub service_type: String,
    pub description: String,
    pub status: Status,
    pub timestamp: Option<Timestamp>,
}

impl Record for MaintenanceRequest {
    const COLLECTION: Collection = Collection::Requests;

    fn into_fields(self) -> Fields {
        let mut fields = crate::fields! {
            "uid" => self.uid,
            "username" => self.username,
            "room" => self.room,
            "serviceType" => self.service_type,
            "description" => self.description,
            "status" => String::from(self.status),
        };
        stamp(&mut fields, "timestamp", self.timestamp);
        fields
    }

    fn from_document(doc: &Document) -> Self {
        Self {
            uid: text(doc, "uid"),
            username: doc.get_str("username").unwrap_or(ANONYMOUS).to_owned(),
            room: text(doc, "room"),
            service_type: text(doc, "serviceType"),
            description: text(doc, "description"),
            status: doc.get_str("status").unwrap_or("Pending").into(),
            timestamp: optional_timestamp(doc, "timestamp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RectorComplaint {
    pub uid: String,
    pub complaint_type: String,
    pub description: String,
    pub status: Status,
    pub timestamp: Option<Timestamp>,
}

impl Record for RectorComplaint {
    const COLLECTION: Collection = Collection::RectorComplaints;

    fn into_fields(self) -> Fields {
        let mut fields = crate::fields! {
            "uid" => self.uid,
            "complaintType" => self.complaint_type,
            "description" => self.description,
            "status" => String::from(self.status),
        };
        stamp(&mut fields, "timestamp", self.timestamp);
        fields
    }

    fn from_document(doc: &Document) -> Self {
        Self {
            uid: text(doc, "uid"),
            complaint_type: text(doc, "complaintType"),
            description: text(doc, "description"),
            status: doc.get_str("status").unwrap_or("Submitted").into(),
            timestamp: optional_timestamp(doc, "timestamp"),
        }
    }
}
