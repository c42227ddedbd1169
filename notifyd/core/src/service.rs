//! Notification Service Contract
//!
//! Decoded IPC calls and their replies, mirroring the
//! `org.freedesktop.Notifications` interface. [`handle_call`] is the single
//! entry point the daemon loop uses to apply a call to the manager.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::manager::NotificationManager;
use crate::notification::{NotificationId, NotifyParams};
use crate::platform::OverlayPlatform;
use crate::render::TextRasterizer;

/// Server name reported by `GetServerInformation`
pub const SERVER_NAME: &str = "notifyd";

/// Vendor reported by `GetServerInformation`
pub const SERVER_VENDOR: &str = "notifyd";

/// Notification specification version implemented
pub const SPEC_VERSION: &str = "1.2";

/// Capabilities reported by `GetCapabilities`
pub const CAPABILITIES: [&str; 3] = ["body", "body-markup", "actions"];

/// Introspection descriptor for the notification interface
pub const INTROSPECTION_XML: &str = r#"<!DOCTYPE node PUBLIC "-//freedesktop//DTD D-BUS Object Introspection 1.0//EN"
"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd">
<node name="/org/freedesktop/Notifications">
  <interface name="org.freedesktop.Notifications">
    <method name="Notify">
      <arg name="app_name" type="s" direction="in"/>
      <arg name="replaces_id" type="u" direction="in"/>
      <arg name="app_icon" type="s" direction="in"/>
      <arg name="summary" type="s" direction="in"/>
      <arg name="body" type="s" direction="in"/>
      <arg name="actions" type="as" direction="in"/>
      <arg name="hints" type="a{sv}" direction="in"/>
      <arg name="expire_timeout" type="i" direction="in"/>
      <arg name="id" type="u" direction="out"/>
    </method>
    <method name="CloseNotification">
      <arg name="id" type="u" direction="in"/>
    </method>
    <method name="GetCapabilities">
      <arg name="capabilities" type="as" direction="out"/>
    </method>
    <method name="GetServerInformation">
      <arg name="name" type="s" direction="out"/>
      <arg name="vendor" type="s" direction="out"/>
      <arg name="version" type="s" direction="out"/>
      <arg name="spec_version" type="s" direction="out"/>
    </method>
  </interface>
</node>
"#;

/// Arguments of a `Notify` call, as sent on the wire
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyRequest {
    /// Sending application
    pub app_name: String,
    /// Id (or key) of a live notification to replace; 0 for none
    pub replaces_id: u32,
    /// Icon name or path (accepted, not displayed)
    pub app_icon: String,
    /// Title line; required
    pub summary: Option<String>,
    /// Body text
    pub body: Option<String>,
    /// Action identifiers and labels (accepted, not displayed)
    pub actions: Vec<String>,
    /// Extra hints (accepted, not interpreted)
    pub hints: HashMap<String, serde_json::Value>,
    /// Milliseconds; negative uses the server default, 0 never expires
    pub expire_timeout: i32,
}

impl Default for NotifyRequest {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            replaces_id: 0,
            app_icon: String::new(),
            summary: None,
            body: None,
            actions: Vec::new(),
            hints: HashMap::new(),
            expire_timeout: -1,
        }
    }
}

impl NotifyRequest {
    /// Request with only a summary set
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Self::default()
        }
    }

    /// Check required fields and convert to upsert parameters
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InvalidRequest`] when the summary is missing
    /// or blank.
    pub fn validate(self) -> Result<NotifyParams, NotifyError> {
        let summary = match self.summary {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Err(NotifyError::InvalidRequest("summary is required".to_string())),
        };

        let expire_after = match self.expire_timeout {
            t if t < 0 => None,
            t => Some(u64::from(t.unsigned_abs())),
        };

        Ok(NotifyParams {
            replace_key: self.replaces_id,
            summary,
            body: self.body.filter(|b| !b.is_empty()),
            app_name: self.app_name,
            expire_after,
        })
    }
}

/// A decoded IPC call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ServiceCall {
    /// Show or replace a notification
    Notify(NotifyRequest),
    /// Close a notification by id
    CloseNotification {
        /// Id returned by `Notify`
        id: u32,
    },
    /// List optional features
    GetCapabilities,
    /// Identify the server
    GetServerInformation,
    /// Describe the interface
    Introspect,
}

impl ServiceCall {
    /// Method name, for logging
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Notify(_) => "Notify",
            Self::CloseNotification { .. } => "CloseNotification",
            Self::GetCapabilities => "GetCapabilities",
            Self::GetServerInformation => "GetServerInformation",
            Self::Introspect => "Introspect",
        }
    }
}

/// Category of a failed call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request was malformed
    InvalidRequest,
    /// The store is full
    Capacity,
    /// No live notification has the given id
    UnknownNotification,
    /// The compositor refused a resource
    Platform,
    /// Painting or publishing failed
    Render,
    /// The call could not be delivered or answered
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidRequest => "invalid request",
            Self::Capacity => "capacity",
            Self::UnknownNotification => "unknown notification",
            Self::Platform => "platform",
            Self::Render => "render",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

impl From<&NotifyError> for ErrorKind {
    fn from(err: &NotifyError) -> Self {
        match err {
            NotifyError::InvalidRequest(_) => Self::InvalidRequest,
            NotifyError::CapacityReached { .. } => Self::Capacity,
            NotifyError::UnknownNotification(_) => Self::UnknownNotification,
            NotifyError::Platform(_) => Self::Platform,
            NotifyError::Render(_) => Self::Render,
        }
    }
}

/// Answer to a [`ServiceCall`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ServiceReply {
    /// The id assigned (or kept on replace)
    Notified {
        /// Notification id
        id: u32,
    },
    /// The notification was closed
    Closed,
    /// Supported optional features
    Capabilities(Vec<String>),
    /// Server identity
    ServerInformation {
        /// Server name
        name: String,
        /// Vendor
        vendor: String,
        /// Server version
        version: String,
        /// Implemented specification version
        spec_version: String,
    },
    /// Interface description
    Introspection(String),
    /// The call failed
    Error {
        /// Failure category
        kind: ErrorKind,
        /// Human-readable detail
        message: String,
    },
}

impl ServiceReply {
    /// Error reply from a notification failure
    #[must_use]
    pub fn from_error(err: &NotifyError) -> Self {
        Self::Error {
            kind: ErrorKind::from(err),
            message: err.to_string(),
        }
    }

    /// Static server identity
    #[must_use]
    pub fn server_information() -> Self {
        Self::ServerInformation {
            name: SERVER_NAME.to_string(),
            vendor: SERVER_VENDOR.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            spec_version: SPEC_VERSION.to_string(),
        }
    }

    /// Static capability list
    #[must_use]
    pub fn capabilities() -> Self {
        Self::Capabilities(CAPABILITIES.iter().map(|c| (*c).to_string()).collect())
    }
}

/// Apply one call to the manager and build its reply
pub fn handle_call<P, T>(manager: &mut NotificationManager<P, T>, call: ServiceCall) -> ServiceReply
where
    P: OverlayPlatform,
    T: TextRasterizer,
{
    match call {
        ServiceCall::Notify(request) => {
            let result = request
                .validate()
                .and_then(|params| manager.upsert(params));
            match result {
                Ok(id) => ServiceReply::Notified { id: id.as_u32() },
                Err(e) => {
                    tracing::debug!(error = %e, "Notify failed");
                    ServiceReply::from_error(&e)
                }
            }
        }
        ServiceCall::CloseNotification { id } => {
            let result = NotificationId::new(id)
                .ok_or_else(|| NotifyError::InvalidRequest("id 0 is never assigned".to_string()))
                .and_then(|id| manager.close(id));
            match result {
                Ok(()) => ServiceReply::Closed,
                Err(e) => ServiceReply::from_error(&e),
            }
        }
        ServiceCall::GetCapabilities => ServiceReply::capabilities(),
        ServiceCall::GetServerInformation => ServiceReply::server_information(),
        ServiceCall::Introspect => ServiceReply::Introspection(INTROSPECTION_XML.to_string()),
    }
}
