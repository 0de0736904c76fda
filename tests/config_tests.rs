use std::io::Write;
use std::time::Duration;

use clap::Parser;
use rdfshape_mcp::config::DEFAULT_BASE_IRI;
use rdfshape_mcp::{CliArgs, ServerConfig, TransportKind};
use serial_test::serial;
use tempfile::NamedTempFile;

fn config_file(extension: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(&format!(".{extension}"))
        .tempfile()
        .expect("tempfile");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

fn args_with_file(file: &NamedTempFile) -> CliArgs {
    CliArgs {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    }
}

#[test]
fn defaults_apply_without_arguments() {
    let config = ServerConfig::from_args(CliArgs::default()).unwrap();
    assert_eq!(config.transport, TransportKind::Http);
    assert_eq!(config.default_base_iri, DEFAULT_BASE_IRI);
    assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
    assert_eq!(config.max_fetch_bytes, 16 * 1024 * 1024);
    assert_eq!(config.endpoint_follow_depth, 2);
    assert_eq!(config.graceful_shutdown_timeout_secs, 30);
    assert!(config.is_tool_enabled("validate"));
}

#[test]
fn yaml_file_fills_what_the_command_line_leaves_out() {
    let file = config_file(
        "yaml",
        "transport: stdio\nfetch_timeout_secs: 5\nenabled_tools: [validate, list_formats]\n",
    );
    let mut args = args_with_file(&file);
    args.fetch_timeout_secs = Some(9);

    let config = ServerConfig::from_args(args).unwrap();
    assert_eq!(config.transport, TransportKind::Stdio);
    assert_eq!(config.fetch_timeout_secs, 9);
    assert!(config.is_tool_enabled("list_formats"));
    assert!(!config.is_tool_enabled("infer_schema"));
}

#[test]
fn json_file_is_accepted() {
    let file = config_file("json", r#"{"default_base_iri": "http://example.org/base/", "endpoint_follow_depth": 0}"#);
    let config = ServerConfig::from_args(args_with_file(&file)).unwrap();
    assert_eq!(config.default_base_iri, "http://example.org/base/");
    assert_eq!(config.endpoint_follow_depth, 0);
}

#[test]
fn invalid_files_and_values_are_rejected() {
    let unknown_field = config_file("yaml", "workspace_root: /tmp\n");
    assert!(ServerConfig::from_args(args_with_file(&unknown_field)).is_err());

    let unknown_tool = config_file("yaml", "enabled_tools: [read_table]\n");
    assert!(ServerConfig::from_args(args_with_file(&unknown_tool)).is_err());

    let relative_base = config_file("yaml", "default_base_iri: base/\n");
    assert!(ServerConfig::from_args(args_with_file(&relative_base)).is_err());

    let zero_timeout = config_file("yaml", "fetch_timeout_secs: 0\n");
    assert!(ServerConfig::from_args(args_with_file(&zero_timeout)).is_err());

    let toml = config_file("toml", "transport = 'http'\n");
    assert!(ServerConfig::from_args(args_with_file(&toml)).is_err());
}

#[test]
#[serial]
fn environment_variables_feed_the_command_line() {
    // SAFETY: serialised with the other environment tests.
    unsafe {
        std::env::set_var("RDFSHAPE_MCP_TRANSPORT", "stdio");
        std::env::set_var("RDFSHAPE_MCP_ENABLED_TOOLS", "validate,convert_schema");
    }
    let parsed = CliArgs::try_parse_from(["rdfshape-mcp"]);
    unsafe {
        std::env::remove_var("RDFSHAPE_MCP_TRANSPORT");
        std::env::remove_var("RDFSHAPE_MCP_ENABLED_TOOLS");
    }

    let config = ServerConfig::from_args(parsed.unwrap()).unwrap();
    assert_eq!(config.transport, TransportKind::Stdio);
    assert!(config.is_tool_enabled("convert_schema"));
    assert!(!config.is_tool_enabled("data_info"));
}

#[test]
#[serial]
fn command_line_flags_win_over_environment() {
    unsafe {
        std::env::set_var("RDFSHAPE_MCP_ENDPOINT_FOLLOW_DEPTH", "7");
    }
    let parsed = CliArgs::try_parse_from(["rdfshape-mcp", "--endpoint-follow-depth", "3"]);
    unsafe {
        std::env::remove_var("RDFSHAPE_MCP_ENDPOINT_FOLLOW_DEPTH");
    }

    let config = ServerConfig::from_args(parsed.unwrap()).unwrap();
    assert_eq!(config.endpoint_follow_depth, 3);
}
