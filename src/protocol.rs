//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::FileKind;
use crate::state::Session;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    NewSession,
    Snapshot {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Upload {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(flatten)]
        file: UploadIn,
    },
    Generate {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(flatten)]
        input: GenerateIn,
    },
    Flip {
        #[serde(rename = "sessionId")]
        session_id: String,
        index: usize,
    },
    Delete {
        #[serde(rename = "sessionId")]
        session_id: String,
        index: usize,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session { session: SessionOut },
    Error { message: String, code: String },
}

/// Session snapshot returned by every operation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub id: String,
    pub cards: Vec<CardOut>,
    pub upload: Option<UploadOut>,
    pub generating: bool,
    /// Empty when there is nothing to show.
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct CardOut {
    pub id: String,
    pub front: String,
    pub back: String,
    pub flipped: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadOut {
    pub name: String,
    pub kind: FileKind,
}

/// Convert the internal session to the public DTO.
pub fn to_out(s: &Session) -> SessionOut {
    SessionOut {
        id: s.id.clone(),
        cards: s
            .deck
            .iter()
            .map(|(c, flipped)| CardOut {
                id: c.id.to_string(),
                front: c.card.front.clone(),
                back: c.card.back.clone(),
                flipped,
            })
            .collect(),
        upload: s.upload.as_ref().map(|u| UploadOut {
            name: u.name.clone(),
            kind: u.content.kind(),
        }),
        generating: s.generating,
        error: s.error.clone(),
    }
}

//
// HTTP request DTOs (also flattened into WS messages)
//

#[derive(Debug, Deserialize)]
pub struct UploadIn {
    pub name: String,
    #[serde(default)]
    pub mime: String,
    #[serde(rename = "dataBase64")]
    pub data_base64: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateIn {
    #[serde(default)]
    pub topic: String,
    /// Clamped to [1, 20]; 5 when absent.
    #[serde(default, rename = "cardCount")]
    pub card_count: Option<i64>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
