//! The `/app` submission form.

use axum::response::Html;

use wavebatch_core::batch::{MAX_BATCH_COUNT, MIN_BATCH_COUNT};

/// GET /app -- HTML form for submitting a batch.
///
/// Posts to `/generate-batch` as a regular URL-encoded form.
pub async fn app_form() -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>wavebatch</title></head>
<body>
  <h1>Generate batch</h1>
  <form method="post" action="/generate-batch">
    <p><label>Prompt<br><textarea name="prompt" rows="4" cols="60" required></textarea></label></p>
    <p><label>Subject image URL<br><input name="subjectUrl" type="url" size="60" required></label></p>
    <p><label>Reference image URLs (comma-separated)<br><input name="refUrls" size="60"></label></p>
    <p><label>Width <input name="width" type="number" value="1024"></label>
       <label>Height <input name="height" type="number" value="1024"></label></p>
    <p><label>Batch count ({MIN_BATCH_COUNT}-{MAX_BATCH_COUNT}) <input name="count" type="number" min="{MIN_BATCH_COUNT}" max="{MAX_BATCH_COUNT}" value="4"></label></p>
    <p><button type="submit">Submit</button></p>
  </form>
</body>
</html>"#
    ))
}
