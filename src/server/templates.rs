//! HTML for the front-end page.
//!
//! The page is self-contained: uploaded files are read in the browser and
//! posted as text, and progress is polled from `/progress` once a second.

use crate::config::{Settings, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::utils::html_escape;

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Vehicle Information Lookup</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 860px; margin: 2rem auto; padding: 0 1rem; color: #222; }
  fieldset { border: 1px solid #ccc; border-radius: 6px; margin-bottom: 1rem; }
  label { display: block; margin: .4rem 0 .1rem; font-weight: 600; }
  input, textarea { width: 100%; box-sizing: border-box; padding: .35rem; }
  textarea { min-height: 7rem; font-family: monospace; }
  .row { display: flex; gap: 1rem; }
  .row > div { flex: 1; }
  button { padding: .5rem 1rem; margin-right: .5rem; }
  #bar { height: 18px; background: #eee; border-radius: 9px; overflow: hidden; }
  #fill { height: 100%; width: 0; background: #2b7de9; transition: width .3s; }
  .muted { color: #666; font-size: .9rem; }
  .error { color: #b00020; }
  table { border-collapse: collapse; width: 100%; margin-top: 1rem; font-size: .85rem; }
  td, th { border: 1px solid #ddd; padding: .25rem .4rem; text-align: left; }
  .fetch_failed, .parse_failed { background: #fdecea; }
</style>
</head>
<body>
<h1>Vehicle Information Lookup</h1>

<form id="start-form">
  <fieldset>
    <legend>Session</legend>
    <label for="session_id">JSESSIONID</label>
    <input id="session_id" name="session_id" autocomplete="off" required>
    <button type="button" id="validate">Check session</button>
    <span id="session-status" class="muted"></span>
  </fieldset>

  <fieldset>
    <legend>Vehicle numbers</legend>
    <label for="keys_text">Enter numbers (comma or newline separated)</label>
    <textarea id="keys_text" name="keys_text"></textarea>
    <label for="key_file">or upload a .csv / .txt file</label>
    <input type="file" id="key_file" accept=".csv,.txt">
  </fieldset>

  <fieldset>
    <legend>Options</legend>
    <div class="row">
      <div>
        <label for="max_workers">Workers</label>
        <input type="number" id="max_workers" min="{{MIN_WORKERS}}" max="{{MAX_WORKERS}}" value="{{WORKERS}}">
      </div>
      <div>
        <label for="delay">Delay (seconds)</label>
        <input type="number" id="delay" min="0" step="0.1" value="{{DELAY}}">
      </div>
    </div>
    <div class="row">
      <div>
        <label for="nic">NIC</label>
        <input id="nic" value="{{NIC}}">
      </div>
      <div>
        <label for="contact">Contact</label>
        <input id="contact" value="{{CONTACT}}">
      </div>
    </div>
  </fieldset>

  <button type="submit" id="start">Start</button>
  <button type="button" id="cancel" disabled>Cancel</button>
</form>

<section id="progress" hidden>
  <h2>Progress</h2>
  <div id="bar"><div id="fill"></div></div>
  <p id="status-line" class="muted"></p>
  <p id="error-line" class="error"></p>
  <p id="downloads"></p>
  <table id="results"><thead><tr>
    <th>Vehicle</th><th>Status</th><th>Make</th><th>Model</th><th>Year</th><th>Class</th><th>Owner</th>
  </tr></thead><tbody></tbody></table>
</section>

<script>
const $ = (id) => document.getElementById(id);
let timer = null;

function esc(s) {
  const d = document.createElement('div');
  d.textContent = s == null ? '' : String(s);
  return d.innerHTML;
}

function fmt(secs) {
  if (secs == null) return 'calculating...';
  secs = Math.round(secs);
  const h = Math.floor(secs / 3600), m = Math.floor((secs % 3600) / 60), s = secs % 60;
  return h ? `${h}h ${m}m ${s}s` : (m ? `${m}m ${s}s` : `${s}s`);
}

function readFile(file) {
  return new Promise((resolve, reject) => {
    const r = new FileReader();
    r.onload = () => resolve(r.result);
    r.onerror = () => reject(r.error);
    r.readAsText(file);
  });
}

async function poll() {
  const res = await fetch('/progress');
  const p = await res.json();
  const pct = p.total ? Math.round(p.processed / p.total * 100) : 0;
  $('fill').style.width = pct + '%';
  $('status-line').textContent =
    `${p.processed}/${p.total} processed` +
    (p.current_key ? ` | last: ${p.current_key}` : '') +
    (p.running ? ` | ETA ${fmt(p.eta_seconds)}` : '');
  $('error-line').textContent = p.error || '';

  const body = $('results').querySelector('tbody');
  body.innerHTML = p.results.map(r =>
    `<tr class="${esc(r.status)}"><td>${esc(r.vehicle_number)}</td><td>${esc(r.status)}${r.error ? ': ' + esc(r.error) : ''}</td>` +
    `<td>${esc(r.make)}</td><td>${esc(r.model)}</td><td>${esc(r.year_of_manufacture)}</td>` +
    `<td>${esc(r.vehicle_class)}</td><td>${esc(r.name_of_ownership)}</td></tr>`).join('');

  if (p.completed) {
    clearInterval(timer);
    $('start').disabled = false;
    $('cancel').disabled = true;
    const links = [];
    if (p.csv_file) links.push(`<a href="/download/${encodeURIComponent(p.csv_file)}">CSV</a>`);
    if (p.json_file) links.push(`<a href="/download/${encodeURIComponent(p.json_file)}">JSON</a>`);
    if (links.length) links.push('<a href="/download_all">ZIP</a>');
    $('downloads').innerHTML = (p.cancelled ? 'Cancelled. ' : 'Done. ') + links.join(' | ');
  }
}

$('start-form').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const payload = {
    session_id: $('session_id').value,
    keys_text: $('keys_text').value,
    max_workers: parseInt($('max_workers').value, 10),
    delay: parseFloat($('delay').value),
    nic: $('nic').value,
    contact: $('contact').value,
  };
  const file = $('key_file').files[0];
  if (file) {
    payload.file_name = file.name;
    payload.file_contents = await readFile(file);
  }
  const res = await fetch('/start_scraping', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify(payload),
  });
  const data = await res.json();
  if (!res.ok) { alert(data.error); return; }
  $('progress').hidden = false;
  $('downloads').innerHTML = '';
  $('start').disabled = true;
  $('cancel').disabled = false;
  timer = setInterval(poll, 1000);
  poll();
});

$('cancel').addEventListener('click', async () => {
  const res = await fetch('/cancel_scraping', { method: 'POST' });
  $('error-line').textContent = (await res.json()).message;
});

$('validate').addEventListener('click', async () => {
  $('session-status').textContent = 'checking...';
  const res = await fetch('/api/validate_session', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify({ session_id: $('session_id').value, nic: $('nic').value, contact: $('contact').value }),
  });
  const data = await res.json();
  $('session-status').textContent = data.message;
  $('session-status').className = data.valid ? 'muted' : 'error';
});
</script>
</body>
</html>
"#;

/// Render the main page with the configured defaults filled in.
pub fn index_page(settings: &Settings) -> String {
    INDEX_TEMPLATE
        .replace("{{MIN_WORKERS}}", &MIN_CONCURRENCY.to_string())
        .replace("{{MAX_WORKERS}}", &MAX_CONCURRENCY.to_string())
        .replace("{{WORKERS}}", &settings.default_workers.to_string())
        .replace("{{DELAY}}", &settings.default_delay_secs.to_string())
        .replace("{{NIC}}", &html_escape(&settings.default_nic))
        .replace("{{CONTACT}}", &html_escape(&settings.default_contact))
}
