//! Static pages served to browsers. The markup is fixed; all behavior lives
//! in the JSON API the inline scripts call.

use maud::{html, Markup, PreEscaped, DOCTYPE};

const LIST_SCRIPT: &str = r#"
const params = new URLSearchParams(location.search);
const current = params.get('path') || '';
const join = (dir, name) => dir ? dir + '/' + name : name;

async function load() {
  const res = await fetch('/api/files?path=' + encodeURIComponent(current));
  const body = await res.json();
  const list = document.getElementById('file-list');
  list.innerHTML = '';
  document.getElementById('current-path').textContent = '/' + current;
  if (!res.ok) {
    list.textContent = body.message;
    return;
  }
  if (current) {
    const up = current.split('/').slice(0, -1).join('/');
    const li = document.createElement('li');
    li.innerHTML = '<a>..</a>';
    li.firstChild.href = '/?path=' + encodeURIComponent(up);
    list.appendChild(li);
  }
  for (const item of body.list) {
    const li = document.createElement('li');
    const a = document.createElement('a');
    const target = join(current, item.name);
    a.textContent = (item.type === 'folder' ? '📁 ' : '📄 ') + item.name;
    a.href = item.type === 'folder'
      ? '/?path=' + encodeURIComponent(target)
      : '/download/?path=' + encodeURIComponent(target);
    li.appendChild(a);
    list.appendChild(li);
  }
}
load();
"#;

const UPLOAD_SCRIPT: &str = r#"
document.getElementById('upload-form').addEventListener('submit', async (event) => {
  event.preventDefault();
  const status = document.getElementById('upload-status');
  const files = document.getElementById('file-input').files;
  for (const file of files) {
    const data = new FormData();
    data.append('file', file);
    status.textContent = 'Uploading ' + file.name + '...';
    const res = await fetch('/api/upload', { method: 'POST', body: data });
    const body = await res.json();
    status.textContent = body.message;
  }
  loadHistory();
});

async function loadHistory() {
  const res = await fetch('/api/history');
  const body = await res.json();
  const list = document.getElementById('history');
  list.innerHTML = '';
  for (const item of body.list) {
    const li = document.createElement('li');
    li.textContent = item.uploaded_at + '  ' + item.name + '  (' + item.size + ' bytes)';
    list.appendChild(li);
  }
}
loadHistory();
"#;

fn layout(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href="/static/styles.css";
            }
            body {
                nav {
                    a href="/" { "Files" }
                    " | "
                    a href="/upload" { "Upload" }
                }
                (content)
            }
        }
    }
}

/// Browsable listing of the shared directory.
pub async fn index_handler() -> Markup {
    layout(
        "Shared Files",
        html! {
            h1 { "Shared Files" }
            div #current-path { "/" }
            ul #file-list { li { "Loading files..." } }
            script { (PreEscaped(LIST_SCRIPT)) }
        },
    )
}

/// Upload form plus recent upload history.
pub async fn upload_page_handler() -> Markup {
    layout(
        "Upload Files",
        html! {
            h1 { "Upload Files" }
            form #upload-form {
                input #file-input type="file" name="file" multiple;
                button type="submit" { "Upload" }
            }
            p #upload-status {}
            h2 { "Recent uploads" }
            ul #history {}
            script { (PreEscaped(UPLOAD_SCRIPT)) }
        },
    )
}
