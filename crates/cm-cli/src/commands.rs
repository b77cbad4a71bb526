use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use bytes::Bytes;
use cm_core::{EmailConfig, Site};
use cm_email::{Attachment, EmailInfo, EmailProperties, EmailTarget};
use cm_files::{FileService, FileWorkArea};
use tracing::warn;

/// Stage `files` in a new work area, promote them and close the work area.
///
/// The work area is closed whether or not promotion succeeded. Returns the
/// published resource names.
pub async fn publish(
    service: &FileService,
    files: &[PathBuf],
    prefix: Option<&str>,
    site: Option<&Site>,
) -> anyhow::Result<Vec<String>> {
    let work_area = service.initialize_work_area(site).await?;

    let result = async {
        let names = stage_files(&work_area, files, prefix).await?;
        service.add_or_update_all_resources(&work_area).await?;
        Ok::<_, anyhow::Error>(names)
    }
    .await;

    if let Err(e) = service.close_work_area(&work_area).await {
        warn!(error = %e, path = ?work_area.path(), "Unable to close work area");
        if result.is_ok() {
            return Err(e.into());
        }
    }

    result
}

async fn stage_files(
    work_area: &FileWorkArea,
    files: &[PathBuf],
    prefix: Option<&str>,
) -> anyhow::Result<Vec<String>> {
    let prefix = match prefix {
        Some(prefix) => checked_prefix(prefix)?,
        None => PathBuf::new(),
    };

    let mut names = Vec::with_capacity(files.len());
    let mut seen = HashSet::with_capacity(files.len());
    for file in files {
        let file_name = file
            .file_name()
            .with_context(|| format!("{} has no file name", file.display()))?;
        let relative = prefix.join(file_name);
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !seen.insert(name.clone()) {
            bail!("more than one file would be published as '{}'", name);
        }
        let target = work_area.resolve(&relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(file, &target)
            .await
            .with_context(|| format!("staging {}", file.display()))?;

        names.push(name);
    }

    Ok(names)
}

fn checked_prefix(prefix: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(prefix.trim_start_matches('/'));
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        bail!("invalid prefix '{}'", prefix);
    }
    Ok(path.to_path_buf())
}

/// Arguments of the `mail` command
pub struct MailRequest {
    pub to: String,
    pub subject: String,
    pub template: PathBuf,
    pub vars: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub attachments: Vec<PathBuf>,
}

pub async fn mail_properties(
    config: &EmailConfig,
    request: MailRequest,
) -> anyhow::Result<EmailProperties> {
    let template = tokio::fs::read_to_string(&request.template)
        .await
        .with_context(|| format!("reading {}", request.template.display()))?;

    let mut info = EmailInfo::from_config(config, request.subject).with_template(template);
    for path in &request.attachments {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", path.display()))?;
        info = info.attach(Attachment::new(filename, Bytes::from(data)));
    }

    let target = EmailTarget::new(request.to)
        .cc(request.cc)
        .bcc(request.bcc);

    let mut props = EmailProperties::new(target, info);
    for var in &request.vars {
        let (key, value) = parse_var(var)?;
        props = props.with_variable(key, value);
    }

    Ok(props)
}

fn parse_var(var: &str) -> anyhow::Result<(String, String)> {
    match var.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => bail!("expected KEY=VALUE, got '{}'", var),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_core::FileServiceConfig;
    use cm_files::MemoryFileServiceProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn service(base: &Path) -> (FileService, Arc<MemoryFileServiceProvider>) {
        let provider = Arc::new(MemoryFileServiceProvider::new());
        let config = FileServiceConfig {
            temp_base_directory: Some(base.to_path_buf()),
            max_generated_directory_depth: 2,
            ..FileServiceConfig::default()
        };
        (FileService::new(config, provider.clone()), provider)
    }

    #[tokio::test]
    async fn test_publish_stages_promotes_and_closes() {
        let base = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        let logo = input.path().join("logo.png");
        let feed = input.path().join("feed.xml");
        std::fs::write(&logo, b"png").unwrap();
        std::fs::write(&feed, b"<feed/>").unwrap();
        let (service, provider) = service(base.path());

        let names = publish(&service, &[logo, feed], Some("/img/"), Some(&Site::new(3)))
            .await
            .unwrap();

        assert_eq!(names, vec!["img/logo.png", "img/feed.xml"]);
        assert_eq!(
            provider.resource_names().await,
            vec!["img/feed.xml", "img/logo.png"]
        );

        // only the site bucket directories remain
        let site_dir = service.base_directory(Some(&Site::new(3)));
        assert!(std::fs::read_dir(&site_dir).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_publish_closes_work_area_on_failure() {
        let base = TempDir::new().unwrap();
        let (service, provider) = service(base.path());
        let missing = base.path().join("does-not-exist.txt");

        let result = publish(&service, &[missing], None, None).await;

        assert!(result.is_err());
        assert!(provider.batches().await.is_empty());
        assert!(std::fs::read_dir(base.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_publish_rejects_duplicate_names() {
        let base = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        std::fs::create_dir_all(input.path().join("a")).unwrap();
        std::fs::create_dir_all(input.path().join("b")).unwrap();
        let first = input.path().join("a/logo.png");
        let second = input.path().join("b/logo.png");
        std::fs::write(&first, b"first").unwrap();
        std::fs::write(&second, b"second").unwrap();
        let (service, provider) = service(base.path());

        let err = publish(&service, &[first, second], None, None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("logo.png"));
        assert!(provider.batches().await.is_empty());
        assert!(std::fs::read_dir(base.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_checked_prefix() {
        assert_eq!(checked_prefix("/img/large").unwrap(), PathBuf::from("img/large"));
        assert!(checked_prefix("../escape").is_err());
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("name=Ada=Lovelace").unwrap(),
            ("name".to_string(), "Ada=Lovelace".to_string())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[tokio::test]
    async fn test_mail_properties() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("order.html");
        let invoice = dir.path().join("invoice.pdf");
        std::fs::write(&template, "<p>Hi ${name}</p>").unwrap();
        std::fs::write(&invoice, b"%PDF").unwrap();

        let props = mail_properties(
            &EmailConfig::default(),
            MailRequest {
                to: "ada@example.com".to_string(),
                subject: "Your order".to_string(),
                template,
                vars: vec!["name=Ada".to_string()],
                cc: vec![],
                bcc: vec!["audit@shop.test".to_string()],
                attachments: vec![invoice],
            },
        )
        .await
        .unwrap();

        assert_eq!(props.info.template.as_deref(), Some("<p>Hi ${name}</p>"));
        assert_eq!(props.info.attachments[0].filename, "invoice.pdf");
        assert_eq!(props.target.bcc_addresses, vec!["audit@shop.test"]);
        assert_eq!(props.variables["name"], "Ada");
    }
}
