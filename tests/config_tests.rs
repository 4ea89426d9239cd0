use anyhow::Result;
use consolectl::config::{self, Config, Context, Overrides, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE};
use consolectl::error::ConfigError;
use tempfile::TempDir;

fn file_config() -> Config {
    Config {
        api_key: Some("file-key".to_string()),
        base_url: Some("https://file.example.com".to_string()),
        page_size: Some(25),
    }
}

#[test]
fn test_overrides_beat_env_and_file() -> Result<()> {
    let env = Config {
        api_key: Some("env-key".to_string()),
        base_url: Some("https://env.example.com".to_string()),
        page_size: None,
    };
    let overrides = Overrides {
        api_key: Some("flag-key".to_string()),
        page_size: Some(10),
        timeout_ms: Some(500),
        ..Overrides::default()
    };

    let ctx = Context::from_parts(file_config(), env, overrides)?;

    assert_eq!(ctx.api_key, "flag-key");
    assert_eq!(ctx.base_url.as_str(), "https://env.example.com/");
    assert_eq!(ctx.page_size, 10);
    assert_eq!(ctx.timeout.as_millis(), 500);
    Ok(())
}

#[test]
fn test_file_values_and_defaults() -> Result<()> {
    let ctx = Context::from_parts(file_config(), Config::default(), Overrides::default())?;
    assert_eq!(ctx.api_key, "file-key");
    assert_eq!(ctx.page_size, 25);

    let ctx = Context::from_parts(
        Config {
            api_key: Some("k".to_string()),
            ..Config::default()
        },
        Config::default(),
        Overrides::default(),
    )?;
    assert_eq!(ctx.base_url.as_str(), format!("{}/", DEFAULT_BASE_URL));
    assert_eq!(ctx.page_size, DEFAULT_PAGE_SIZE);
    Ok(())
}

#[test]
fn test_base_url_keeps_path_prefix() -> Result<()> {
    let overrides = Overrides {
        api_key: Some("k".to_string()),
        base_url: Some("https://tenant.example.com/console".to_string()),
        ..Overrides::default()
    };
    let ctx = Context::from_parts(Config::default(), Config::default(), overrides)?;

    assert_eq!(ctx.base_url.as_str(), "https://tenant.example.com/console/");
    Ok(())
}

#[test]
fn test_missing_or_blank_api_key() {
    let err = Context::from_parts(Config::default(), Config::default(), Overrides::default()).unwrap_err();
    assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::MissingApiKey)));

    let blank = Overrides {
        api_key: Some("   ".to_string()),
        ..Overrides::default()
    };
    let err = Context::from_parts(Config::default(), Config::default(), blank).unwrap_err();
    assert!(err.to_string().contains("API key is required"));
}

#[test]
fn test_invalid_base_url() {
    let overrides = Overrides {
        api_key: Some("k".to_string()),
        base_url: Some("not a url".to_string()),
        ..Overrides::default()
    };
    let err = Context::from_parts(Config::default(), Config::default(), overrides).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidBaseUrl(url)) if url == "not a url"
    ));
}

#[test]
fn test_masked_view_hides_key() -> Result<()> {
    let overrides = Overrides {
        api_key: Some("sk-live-abcdef1234".to_string()),
        ..Overrides::default()
    };
    let ctx = Context::from_parts(Config::default(), Config::default(), overrides)?;
    let masked = ctx.masked();

    assert_eq!(masked["api_key"], "****1234");
    assert_eq!(masked["page_size"], DEFAULT_PAGE_SIZE);
    assert!(!masked.to_string().contains("abcdef"));

    let overrides = Overrides {
        api_key: Some("abc".to_string()),
        ..Overrides::default()
    };
    let ctx = Context::from_parts(Config::default(), Config::default(), overrides)?;
    assert_eq!(ctx.masked()["api_key"], "****");
    Ok(())
}

#[test]
fn test_load_missing_file_is_empty() -> Result<()> {
    let dir = TempDir::new()?;
    let config = config::load(&dir.path().join("config.yaml"))?;

    assert_eq!(config, Config::default());
    Ok(())
}

#[test]
fn test_save_merges_with_existing_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("nested").join("config.yaml");

    config::save(&path, file_config())?;
    let merged = config::save(
        &path,
        Config {
            page_size: Some(200),
            ..Config::default()
        },
    )?;

    assert_eq!(merged.api_key.as_deref(), Some("file-key"));
    assert_eq!(merged.page_size, Some(200));
    assert_eq!(config::load(&path)?, merged);
    Ok(())
}

#[test]
fn test_load_rejects_malformed_yaml() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "page_size: [not, a, number]\n")?;

    let err = config::load(&path).unwrap_err();
    assert!(err.to_string().contains("parsing"));
    Ok(())
}
