//! Payloads for the text/status/file-query side channel (§11: adopted
//! from the original's `messages.h` enum shapes).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which stream a `SendText` line came from (`vistle/core/messages.h`
/// `SendText::TextType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextType {
    Cout,
    Cerr,
    Clog,
    Info,
    Warning,
    Error,
}

/// A line of text surfaced to UIs, optionally in reply to another
/// message (§7: "errors ... surfaced to UIs via `SendText(Error, text)`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTextPayload {
    pub text_type: TextType,
    pub text: String,
    pub in_reply_to: Option<Uuid>,
}

impl SendTextPayload {
    pub fn new(text_type: TextType, text: impl Into<String>) -> Self {
        Self { text_type, text: text.into(), in_reply_to: None }
    }

    /// Builds the error-propagation payload §7 names.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(TextType::Error, text)
    }

    pub fn in_reply_to(mut self, uuid: Uuid) -> Self {
        self.in_reply_to = Some(uuid);
        self
    }
}

/// Priority of an `UpdateStatus` line (`UpdateStatus::Importance`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Importance {
    Bulk,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusPayload {
    pub text: String,
    pub importance: Importance,
}

impl UpdateStatusPayload {
    pub fn new(text: impl Into<String>, importance: Importance) -> Self {
        Self { text: text.into(), importance }
    }
}

/// What a `FileQuery` is asking for (`FileQuery::Command`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileQueryCommand {
    SystemInfo,
    LookUpFiles,
    ReadDirectory,
    MakeDirectory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileQueryPayload {
    pub module_id: crate::id::Id,
    pub path: String,
    pub command: FileQueryCommand,
}

/// Outcome of a `FileQuery` (`FileQueryResult::Status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileQueryStatus {
    Ok,
    Error,
    DoesNotExist,
    NoPermission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileQueryResultPayload {
    pub command: FileQueryCommand,
    pub status: FileQueryStatus,
    pub path: String,
}

/// File I/O is out of scope for this core (spec.md Non-goals: "file-format
/// readers and writers"), but the envelope pair is part of the routing
/// table, so every `FileQuery` gets a `DoesNotExist` reply rather than
/// going unhandled (§11).
pub fn handle_file_query(query: &FileQueryPayload) -> FileQueryResultPayload {
    FileQueryResultPayload {
        command: query.command,
        status: FileQueryStatus::DoesNotExist,
        path: query.path.clone(),
    }
}

/// Announces a discoverable module to the rest of the session; wraps
/// [`crate::glue::AvailableModule`] with the hub that found it (§4.10/§11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleAvailablePayload {
    pub hub: crate::id::Id,
    pub name: String,
    pub path: String,
}

impl ModuleAvailablePayload {
    pub fn announce(hub: crate::id::Id, module: &crate::glue::AvailableModule) -> Self {
        Self {
            hub,
            name: module.name.clone(),
            path: module.path.to_string_lossy().into_owned(),
        }
    }
}

/// Teardown reason carried by `CloseConnection` instead of a bare
/// socket shutdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseConnectionPayload {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_query_always_stubs_does_not_exist() {
        let query = FileQueryPayload {
            module_id: 1,
            path: "/data/in.vtk".to_string(),
            command: FileQueryCommand::ReadDirectory,
        };
        let result = handle_file_query(&query);
        assert_eq!(result.status, FileQueryStatus::DoesNotExist);
        assert_eq!(result.path, "/data/in.vtk");
        assert_eq!(result.command, FileQueryCommand::ReadDirectory);
    }

    #[test]
    fn send_text_error_helper_sets_the_error_text_type() {
        let payload = SendTextPayload::error("module 3 crashed");
        assert_eq!(payload.text_type, TextType::Error);
        assert_eq!(payload.text, "module 3 crashed");
        assert!(payload.in_reply_to.is_none());
    }

    #[test]
    fn importance_orders_bulk_below_high() {
        assert!(Importance::Bulk < Importance::High);
    }

    #[test]
    fn module_available_announce_carries_the_announcing_hub() {
        let module = crate::glue::AvailableModule {
            name: "IsoSurface".to_string(),
            path: "/opt/vistle/IsoSurface".into(),
        };
        let payload = ModuleAvailablePayload::announce(3, &module);
        assert_eq!(payload.hub, 3);
        assert_eq!(payload.name, "IsoSurface");
        assert_eq!(payload.path, "/opt/vistle/IsoSurface");
    }
}
