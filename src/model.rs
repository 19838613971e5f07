use crate::date::PortalTimestamp;
use serde::{Deserialize, Deserializer, Serialize};

/// Role of a history row, taken from the CSS marker the row carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepRole {
    Open,
    Concluded,
}

impl StepRole {
    /// Description used when a row carries a date but no other text
    pub fn default_description(&self) -> &'static str {
        match self {
            StepRole::Open => "Andamento aberto",
            StepRole::Concluded => "Andamento concluído",
        }
    }
}

/// Text encoding a document was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "latin-1")]
    Latin1,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
        }
    }
}

/// One row of the process-history table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressStep {
    pub description: String,
    pub timestamp: PortalTimestamp,
    pub role: StepRole,
}

/// Latest row of the protocol table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub status_text: Option<String>,
    pub status_date: Option<PortalTimestamp>,
}

impl StatusRecord {
    pub fn is_empty(&self) -> bool {
        self.status_text.is_none() && self.status_date.is_none()
    }
}

/// Everything extracted from one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    /// The open step, or the most recent concluded one when nothing is open
    pub current_step: Option<ProgressStep>,
    pub stale: bool,
    /// Latest concluded step logged after the open step
    pub stale_trigger: Option<ProgressStep>,
    pub all_concluded: bool,
    pub status: Option<StatusRecord>,
    pub encoding: TextEncoding,
}

impl ExtractionResult {
    pub fn found(&self) -> bool {
        self.current_step.is_some()
    }

    /// Nothing came out of either target table
    pub fn is_empty(&self) -> bool {
        self.current_step.is_none() && self.status.is_none()
    }

    /// True if any extracted text contains U+FFFD, i.e. the bytes were
    /// decoded with the wrong encoding
    pub fn has_replacement_chars(&self) -> bool {
        let step_texts = [&self.current_step, &self.stale_trigger]
            .into_iter()
            .flatten()
            .flat_map(|s| [s.description.as_str(), s.timestamp.raw.as_str()]);
        let status_texts = self.status.iter().flat_map(|s| {
            [
                s.status_text.as_deref(),
                s.status_date.as_ref().map(|d| d.raw.as_str()),
            ]
            .into_iter()
            .flatten()
        });
        step_texts
            .chain(status_texts)
            .any(|text| text.contains(char::REPLACEMENT_CHARACTER))
    }

    /// Non-empty and cleanly decoded
    pub fn is_usable(&self) -> bool {
        !self.is_empty() && !self.has_replacement_chars()
    }
}

/// Successful lookup, in the wire shape the dashboard consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundBody {
    pub found: bool,
    pub data: String,
    #[serde(rename = "dataIso")]
    pub data_iso: Option<String>,
    pub descricao: String,
    pub alerta_andamento_desatualizado: bool,
    pub sei_data_mais_recente_concluido: Option<String>,
    pub sei_descricao_mais_recente_concluido: Option<String>,
    pub todos_andamentos_concluidos: bool,
    pub sei_ultimo_status: Option<String>,
    pub sei_ultimo_status_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotFoundBody {
    pub found: bool,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "manualHint")]
    pub manual_hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Outcome of a single lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LookupResponse {
    Found(FoundBody),
    /// Page loaded but its structure did not match
    NotFound(NotFoundBody),
    /// Portal unreachable, answered with a non-success status, or the URL
    /// could not be used at all
    Unreachable(FailureBody),
}

impl LookupResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            LookupResponse::Found(_) | LookupResponse::NotFound(_) => 200,
            LookupResponse::Unreachable(_) => 502,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LookupResponse::Found(_))
    }

    pub fn found_body(&self) -> Option<&FoundBody> {
        match self {
            LookupResponse::Found(body) => Some(body),
            _ => None,
        }
    }
}

/// JSON output for the batch update path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateSummary {
    pub updated: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Partial update of a stored work item.
///
/// Outer `None` means the field was absent and is left untouched;
/// `Some(None)` means it was sent as `null` and is cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObraUpdate {
    #[serde(rename = "obraId", skip_deserializing)]
    pub obra_id: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sei_ultimo_andamento: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sei_ultimo_andamento_data: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sei_alerta_andamento_desatualizado: Option<Option<bool>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sei_data_mais_recente_concluido: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sei_descricao_mais_recente_concluido: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub todos_andamentos_concluidos: Option<Option<bool>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sei_ultimo_status: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub sei_ultimo_status_data: Option<Option<String>>,
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ObraUpdate {
    /// Every progress field, taken from a successful lookup
    pub fn from_found(obra_id: &str, body: &FoundBody) -> Self {
        Self {
            obra_id: obra_id.to_string(),
            sei_ultimo_andamento: Some(Some(body.descricao.clone())),
            sei_ultimo_andamento_data: Some(body.data_iso.clone().or_else(|| Some(body.data.clone()))),
            sei_alerta_andamento_desatualizado: Some(Some(body.alerta_andamento_desatualizado)),
            sei_data_mais_recente_concluido: Some(body.sei_data_mais_recente_concluido.clone()),
            sei_descricao_mais_recente_concluido: Some(
                body.sei_descricao_mais_recente_concluido.clone(),
            ),
            todos_andamentos_concluidos: Some(Some(body.todos_andamentos_concluidos)),
            sei_ultimo_status: Some(body.sei_ultimo_status.clone()),
            sei_ultimo_status_data: Some(body.sei_ultimo_status_data.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sei_ultimo_andamento.is_none()
            && self.sei_ultimo_andamento_data.is_none()
            && self.sei_alerta_andamento_desatualizado.is_none()
            && self.sei_data_mais_recente_concluido.is_none()
            && self.sei_descricao_mais_recente_concluido.is_none()
            && self.todos_andamentos_concluidos.is_none()
            && self.sei_ultimo_status.is_none()
            && self.sei_ultimo_status_data.is_none()
    }
}

/// A stored work item with its last known progress fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObraRecord {
    pub id: String,
    pub sei_url: Option<String>,
    pub sei_ultimo_andamento: Option<String>,
    pub sei_ultimo_andamento_data: Option<String>,
    pub sei_alerta_andamento_desatualizado: bool,
    pub sei_data_mais_recente_concluido: Option<String>,
    pub sei_descricao_mais_recente_concluido: Option<String>,
    pub todos_andamentos_concluidos: bool,
    pub sei_ultimo_status: Option<String>,
    pub sei_ultimo_status_data: Option<String>,
    pub updated_at: Option<String>,
}
