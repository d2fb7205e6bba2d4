//! Command routing integration tests
//!
//! Exercises the command parser together with the pure reply builders, end
//! to end from raw message text to reply text.

use asistente_rs::bot::handlers::{saludo_text, Command, CLIMA_USAGE};
use asistente_rs::utils::sanitize_html;
use teloxide::utils::command::BotCommands;

const BOT_NAME: &str = "asistente_bot";

fn parse(text: &str) -> Command {
    Command::parse(text, BOT_NAME).expect("command should parse")
}

#[test]
fn test_all_commands_parse() {
    assert!(matches!(parse("/start"), Command::Start));
    assert!(matches!(parse("/help"), Command::Help));
    assert!(matches!(parse("/fecha"), Command::Fecha));
    assert!(matches!(parse("/clima Paris, FR"), Command::Clima(_)));
    assert!(matches!(parse("/saludo Carlos"), Command::Saludo(_)));
}

#[test]
fn test_clima_argument_is_rest_of_line() {
    let Command::Clima(ciudad) = parse("/clima Paris, FR") else {
        panic!("expected Clima");
    };
    assert_eq!(ciudad, "Paris, FR");
}

#[test]
fn test_clima_without_argument_yields_usage_prompt() {
    // A bare /clima parses with an empty argument; the handler answers with
    // the usage hint instead of calling the weather tool.
    let Command::Clima(ciudad) = parse("/clima") else {
        panic!("expected Clima");
    };
    assert!(ciudad.trim().is_empty());
    assert!(CLIMA_USAGE.contains("/clima"));
}

#[test]
fn test_saludo_with_argument_overrides_sender() {
    let Command::Saludo(nombre) = parse("/saludo Carlos") else {
        panic!("expected Saludo");
    };
    assert!(saludo_text(nombre.trim()).contains("Carlos"));
}

#[test]
fn test_saludo_without_argument_falls_back_to_sender_name() {
    let Command::Saludo(nombre) = parse("/saludo") else {
        panic!("expected Saludo");
    };
    // Empty argument: the handler substitutes the sender's first name.
    assert!(nombre.trim().is_empty());
    assert!(saludo_text("Ana").contains("Ana"));
}

#[test]
fn test_unknown_command_is_not_routed() {
    assert!(Command::parse("/desconocido", BOT_NAME).is_err());
}

#[test]
fn test_sanitized_reply_renders_literal_markup() {
    // What the agent pipeline would send for a markup-laden answer.
    let agent_output = "Usa <b>negrita</b> & *asteriscos*";
    let safe = sanitize_html(agent_output);
    assert_eq!(safe, "Usa &lt;b&gt;negrita&lt;/b&gt; &amp; *asteriscos*");
    // Re-sanitizing an already safe reply changes nothing.
    assert_eq!(sanitize_html(&safe), safe);
}
