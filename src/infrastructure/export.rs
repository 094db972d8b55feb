//! Export rendering

use tracing::debug;

use crate::domain::{ExportError, ExportFormat, ExportRenderer, SearchResult};

/// Pretty-printed JSON of the full search result
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter;

impl ExportRenderer for JsonExporter {
    fn render(&self, result: &SearchResult, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        match format {
            ExportFormat::Json => {
                let bytes = serde_json::to_vec_pretty(result)?;
                debug!("Rendered search {} as JSON ({} bytes)", result.id, bytes.len());
                Ok(bytes)
            }
            other => Err(ExportError::UnsupportedFormat(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Platform, SearchRequest};

    #[test]
    fn renders_json_and_rejects_other_formats() {
        let request = SearchRequest::new("cable", [Platform::Lazada], 5);
        let result = SearchResult::pending(&request);

        let bytes = JsonExporter.render(&result, ExportFormat::Json).unwrap();
        let decoded: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded["keyword"], "cable");
        assert_eq!(decoded["status"], "pending");
        assert!(decoded["results"]["lazada"].as_array().unwrap().is_empty());

        assert!(matches!(
            JsonExporter.render(&result, ExportFormat::Csv),
            Err(ExportError::UnsupportedFormat(ExportFormat::Csv))
        ));
        assert!(JsonExporter.render(&result, ExportFormat::Spreadsheet).is_err());
    }
}
