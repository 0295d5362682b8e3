//! Generate an HTML/SVG visualization of the keyboard's note grid.
//! One square per matrix cell, labelled with its note name.

use firmware::midi::note_name;
use midikbd_keymap::{KeyMap, COLS, ROWS};

/// Key unit size in SVG pixels.
const U: f64 = 54.0;
/// Gap between keys.
const GAP: f64 = 4.0;
/// Step: key + gap.
const S: f64 = U + GAP;
/// Key corner radius.
const R: f64 = 4.0;
/// Margin around the SVG content.
const MARGIN: f64 = 20.0;
/// Room for the title above the grid.
const TITLE: f64 = 30.0;

/// Render the grid as an SVG group, row 0 on top.
fn render_grid(keymap: &KeyMap) -> String {
    let mut svg = String::new();

    svg.push_str(&format!(
        r#"<g transform="translate({MARGIN}, {})">"#,
        MARGIN + TITLE
    ));
    svg.push_str(r#"<text x="0" y="-10" class="title">Note map</text>"#);

    for (index, key) in keymap.keys().iter().enumerate() {
        let (row, col) = midikbd_keymap::position(index);
        let x = col as f64 * S;
        let y = row as f64 * S;

        let key_class = if !key.is_mapped() {
            "key unused"
        } else if key.is_sharp() {
            "key sharp"
        } else {
            "key"
        };

        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{U}" height="{U}" rx="{R}" class="{key_class}"/>"#,
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" class="index">{index}</text>"#,
            x + 4.0,
            y + 10.0,
        ));

        if let Some(name) = note_name(key.note) {
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" class="label">{}</text>"#,
                x + U / 2.0,
                y + U / 2.0 + 1.0,
                html_escape(&name),
            ));
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" class="note">{}</text>"#,
                x + U / 2.0,
                y + U - 8.0,
                key.note,
            ));
        }
    }

    svg.push_str("</g>");
    svg
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Generate the complete HTML document with inline SVG.
pub fn generate_html(keymap: &KeyMap) -> String {
    let total_width = COLS as f64 * S - GAP + 2.0 * MARGIN;
    let total_height = ROWS as f64 * S - GAP + 2.0 * MARGIN + TITLE;

    let mut html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>MIDI Keyboard Layout</title>
<style>
  body {{
    background: #1a1a2e;
    color: #eee;
    font-family: system-ui, -apple-system, sans-serif;
    display: flex;
    justify-content: center;
    padding: 2em;
  }}
  svg {{
    filter: drop-shadow(0 2px 8px rgba(0,0,0,0.3));
  }}
  .key {{
    fill: #e8e8e8;
    stroke: #0f3460;
    stroke-width: 1.5;
  }}
  .key:hover {{
    stroke: #e94560;
  }}
  .key.sharp {{
    fill: #16213e;
  }}
  .key.unused {{
    fill: #0d1117;
    stroke: #21262d;
    stroke-dasharray: 3 3;
  }}
  .label {{
    fill: #e94560;
    font-family: "JetBrains Mono", "Fira Code", monospace;
    font-size: 13px;
    font-weight: bold;
    text-anchor: middle;
    dominant-baseline: middle;
    pointer-events: none;
  }}
  .index, .note {{
    fill: #888;
    font-family: "JetBrains Mono", "Fira Code", monospace;
    font-size: 9px;
    pointer-events: none;
  }}
  .note {{
    text-anchor: middle;
  }}
  .title {{
    fill: #e94560;
    font-size: 16px;
    font-weight: bold;
  }}
</style>
</head>
<body>
<svg width="{total_width}" height="{total_height}" xmlns="http://www.w3.org/2000/svg">
"#
    );

    html.push_str(&render_grid(keymap));
    html.push_str("\n</svg>\n</body>\n</html>\n");
    html
}
