//! HTML page rendering

use crate::models::{Project, Release};

use super::escape_html;

const STYLESHEET: &str = "/static/style.css";

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <link rel=\"stylesheet\" href=\"{css}\">\n</head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n",
        title = escape_html(title),
        css = STYLESHEET,
        body = body,
    )
}

fn link(href: &str, text: &str) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        escape_html(href),
        escape_html(text)
    )
}

/// Project list page
pub fn render_index(title: &str, projects: &[Project]) -> String {
    let mut body = String::from("<ul class=\"projects\">\n");
    for project in projects {
        body.push_str(&format!(
            "<li>{}</li>\n",
            link(&project.absolute_url(), &project.name)
        ));
    }
    body.push_str("</ul>\n");

    layout(title, &body)
}

/// Links to every file of a project, in the given order
///
/// Anchors to distribution files carry a `#sha256=` fragment so installers
/// can verify downloads.
pub fn render_links(project: &Project, releases: &[Release]) -> String {
    let mut body = String::new();

    for release in releases {
        body.push_str(&format!(
            "{} ({})<br/>\n",
            link(&release.download_url(), &release.filename),
            link(&release.absolute_url(), &release.version),
        ));
    }

    if let Some(home_page) = &project.home_page {
        body.push_str(&format!(
            "<a href=\"{}\" rel=\"homepage\">home page</a><br/>\n",
            escape_html(home_page)
        ));
    }
    if let Some(download_url) = &project.download_url {
        body.push_str(&format!(
            "<a href=\"{}\" rel=\"download\">download</a><br/>\n",
            escape_html(download_url)
        ));
    }

    layout(&format!("Links for {}", project.name), &body)
}

/// Metadata and files of one version
pub fn render_version(project: &Project, version: &str, releases: &[Release]) -> String {
    let mut body = String::from("<dl class=\"metadata\">\n");

    let mut field = |label: &str, value: &str| {
        if !value.is_empty() {
            body.push_str(&format!(
                "<dt>{}</dt><dd>{}</dd>\n",
                escape_html(label),
                escape_html(value)
            ));
        }
    };
    field("Version", version);
    field("Summary", &project.summary);
    field("Author", &project.author);
    field("Author e-mail", &project.author_email);
    field("License", &project.license);
    field("Metadata version", &project.metadata_version);
    for classifier in &project.classifiers {
        field("Classifier", classifier);
    }

    if let Some(home_page) = &project.home_page {
        body.push_str(&format!("<dt>Home page</dt><dd>{}</dd>\n", link(home_page, home_page)));
    }
    body.push_str("</dl>\n");

    if !project.description.is_empty() {
        body.push_str(&format!(
            "<pre class=\"description\">{}</pre>\n",
            escape_html(&project.description)
        ));
    }

    body.push_str(
        "<table class=\"files\">\n<tr><th>File</th><th>Type</th><th>Python</th>\
         <th>Size</th><th>MD5</th><th>Uploaded</th></tr>\n",
    );
    for release in releases {
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td><td>{}</td></tr>\n",
            link(&release.download_url(), &release.filename),
            escape_html(release.type_label()),
            escape_html(&release.pyversion),
            release.size,
            escape_html(&release.md5_digest),
            release.upload_time.format("%Y-%m-%d %H:%M"),
        ));
    }
    body.push_str("</table>\n");

    layout(&format!("{} {}", project.name, version), &body)
}
