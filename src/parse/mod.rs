pub mod cells;
pub mod history;
pub mod protocol;
pub mod rows;
pub mod table;

use crate::model::{ExtractionResult, TextEncoding};
use scraper::Html;

/// Extract progress and protocol status from decoded page text.
/// Never fails: a page without the expected structure gives an empty result.
pub fn extract(html: &str, encoding: TextEncoding) -> ExtractionResult {
    let document = Html::parse_document(html);
    let history = history::find_progress(&document);
    let status = protocol::find_latest_status(&document);

    ExtractionResult {
        current_step: history.current,
        stale: history.stale_trigger.is_some(),
        stale_trigger: history.stale_trigger,
        all_concluded: history.all_concluded,
        status,
        encoding,
    }
}
