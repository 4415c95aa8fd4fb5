//! Live-reload script injection.

use crate::embed::serve::{LIVERELOAD_JS, LivereloadVars};
use crate::reload::Epoch;

/// Insert the poller before the last `</body>`, or append it when the
/// document has none (browsers still run it).
pub fn inject_livereload(content: &[u8], epoch: Epoch, request_id: Epoch) -> Vec<u8> {
    let script = format!(
        "<script>{}</script>",
        LIVERELOAD_JS.render(&LivereloadVars { epoch, request_id })
    );
    let script = script.as_bytes();

    const PATTERN: &[u8] = b"</body>";

    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(script);
    result.extend_from_slice(&content[pos..]);
    result
}
