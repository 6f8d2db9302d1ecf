use super::*;
use std::path::Path;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }

    pub(super) fn search_config(enabled: bool) -> Config {
        let mut config = Config::default();
        config.search.enabled = enabled;
        config
    }
}

use test_helpers::{parse_args, search_config};

#[test]
fn no_subcommand_means_chat() {
    let args = parse_args(&["chatgate"]);
    assert!(args.command.is_none());
    assert!(args.config.is_none());
}

#[test]
fn say_collects_repeated_providers_and_prompt_words() {
    let argv = [
        "chatgate", "say", "-p", "openai", "--provider", "claude", "-m", "small", "what", "is",
        "new?",
    ];
    match parse_args(&argv).command {
        Some(Commands::Say {
            providers,
            turn,
            prompt,
        }) => {
            assert_eq!(providers, vec!["openai", "claude"]);
            assert_eq!(turn.model.as_deref(), Some("small"));
            assert_eq!(prompt.join(" "), "what is new?");
        }
        other => panic!("expected say for argv={argv:?}, got {other:?}"),
    }
}

#[test]
fn say_requires_a_prompt() {
    assert!(Args::try_parse_from(["chatgate", "say", "-p", "openai"]).is_err());
}

#[test]
fn global_config_flag_works_after_the_subcommand() {
    let args = parse_args(&["chatgate", "providers", "--config", "/tmp/alt.toml"]);
    assert_eq!(args.config.as_deref(), Some(Path::new("/tmp/alt.toml")));
    assert!(matches!(args.command, Some(Commands::Providers)));
}

#[test]
fn search_flags_override_the_config_and_each_other() {
    let enabled = search_config(true);
    let disabled = search_config(false);

    let cases: [(&[&str], bool, bool); 4] = [
        (&["chatgate", "chat"], true, false),
        (&["chatgate", "chat", "--search"], true, true),
        (&["chatgate", "chat", "--no-search"], false, false),
        (&["chatgate", "chat", "--no-search", "--search"], true, true),
    ];

    for (argv, with_enabled, with_disabled) in cases {
        let Some(Commands::Chat { turn, .. }) = parse_args(argv).command else {
            panic!("expected chat for argv={argv:?}");
        };
        assert_eq!(
            turn.search_enabled(&enabled),
            with_enabled,
            "argv={argv:?} with search enabled"
        );
        assert_eq!(
            turn.search_enabled(&disabled),
            with_disabled,
            "argv={argv:?} with search disabled"
        );
    }
}

#[test]
fn chat_accepts_log_and_provider() {
    let args = parse_args(&["chatgate", "chat", "-p", "gemini", "-l", "chat.log"]);
    let Some(Commands::Chat { provider, turn }) = args.command else {
        panic!("expected chat");
    };
    assert_eq!(provider.as_deref(), Some("gemini"));
    assert_eq!(turn.log.as_deref(), Some(Path::new("chat.log")));
}

#[test]
fn search_joins_query_words() {
    let args = parse_args(&["chatgate", "search", "rust", "async", "book"]);
    let Some(Commands::Search { query }) = args.command else {
        panic!("expected search");
    };
    assert_eq!(query.join(" "), "rust async book");
}

#[test]
fn gateway_gets_search_only_when_requested_and_configured() {
    let mut config = search_config(true);
    let (gateway, _rx) = build_gateway(&config, SessionManager::default(), true);
    assert!(gateway.search_provider().is_none());

    config.search.backends.push(crate::core::search::SearchBackend::Searxng(
        crate::core::search::SearxngConfig {
            url: "http://localhost:8888".into(),
            ..Default::default()
        },
    ));
    let (gateway, _rx) = build_gateway(&config, SessionManager::default(), true);
    assert_eq!(gateway.search_provider().map(SearchProvider::name), Some("searxng"));

    let (gateway, _rx) = build_gateway(&config, SessionManager::default(), false);
    assert!(gateway.search_provider().is_none());
}
