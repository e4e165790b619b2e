//! Full-page HTML output.
//!
//! The annotated table is embedded next to a globe; the inline script reads
//! `data-lat`/`data-lng` from every body row to place markers and to focus
//! the globe when a row is clicked.

use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>News Globe</title>
<style>
body { margin: 0; display: flex; height: 100vh; background: #0b1d2a; color: #e6edf3; }
#globe { flex: 1 1 55%; }
#stories { flex: 1 1 45%; overflow-y: auto; }
#stories tr[data-lat] { cursor: pointer; }
.no-data { padding: 2em; font-family: sans-serif; }
</style>
<script src="https://unpkg.com/globe.gl"></script>
</head>
<body>
<div id="globe"></div>
<div id="stories">
"#;

const PAGE_TAIL: &str = r#"</div>
<script>
const rows = Array.from(document.querySelectorAll('tr[data-lat][data-lng]'))
  .filter(row => row.dataset.lat !== '' && row.dataset.lng !== '');
const el = document.getElementById('globe');
const globe = Globe()
  .globeImageUrl('//unpkg.com/three-globe/example/img/earth-blue-marble.jpg')
  .bumpImageUrl('//unpkg.com/three-globe/example/img/earth-topology.png')
  .pointOfView({ altitude: 2.5 })
  .width(el.offsetWidth)
  .height(el.offsetHeight)
  .pointsData(rows.map(row => ({
    lat: parseFloat(row.dataset.lat),
    lng: parseFloat(row.dataset.lng),
    size: 0.1,
    color: 'red'
  })))(el);
window.addEventListener('resize', () => globe.width(el.offsetWidth).height(el.offsetHeight));
rows.forEach(row => row.addEventListener('click', () => {
  globe.pointOfView({ lat: parseFloat(row.dataset.lat), lng: parseFloat(row.dataset.lng), altitude: 1.5 }, 1000);
}));
</script>
</body>
</html>
"#;

/// Wrap table markup in the page shell.
pub fn render_page(table_html: &str) -> String {
    let mut page = String::with_capacity(PAGE_HEAD.len() + table_html.len() + PAGE_TAIL.len());
    page.push_str(PAGE_HEAD);
    page.push_str(table_html);
    if !table_html.ends_with('\n') {
        page.push('\n');
    }
    page.push_str(PAGE_TAIL);
    page
}

/// Write the page to `path`, creating parent directories as needed.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_page(path: &Path, table_html: &str) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, render_page(table_html)).await?;
    info!("Wrote page");
    Ok(())
}
