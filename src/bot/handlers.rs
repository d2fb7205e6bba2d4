//! Command router and message handlers
//!
//! Static slash commands reply directly; any other text goes through the
//! agent dispatcher and the response sanitizer.

use crate::agent::AgentDispatcher;
use crate::config::{BOT_TIMEZONE, TELEGRAM_MAX_MESSAGE_LEN};
use crate::tools::{weather, ToolRegistry};
use crate::utils;
use anyhow::Result;
use chrono::{DateTime, Datelike};
use chrono_tz::Tz;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ParseMode};
use teloxide::utils::command::{BotCommands, ParseError};
use tracing::error;

/// Pass the raw argument tail through unchanged; an absent argument becomes
/// an empty string the handlers treat as "not given".
fn rest_of_line(input: String) -> Result<(String,), ParseError> {
    Ok((input,))
}

/// Supported slash commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Comandos disponibles:")]
pub enum Command {
    /// Welcome message
    #[command(description = "mensaje de bienvenida.")]
    Start,
    /// Command list
    #[command(description = "muestra esta lista de comandos.")]
    Help,
    /// Current date and time
    #[command(description = "muestra la fecha y hora actual.")]
    Fecha,
    /// Current weather for a city
    #[command(description = "clima actual de una ciudad.", parse_with = rest_of_line)]
    Clima(String),
    /// Greeting, optionally by name
    #[command(description = "saluda por nombre.", parse_with = rest_of_line)]
    Saludo(String),
}

/// Usage hint for /clima without arguments
pub const CLIMA_USAGE: &str = "Uso: /clima &lt;ciudad&gt;. Ejemplo: /clima Paris, FR";

const DIAS: [&str; 7] = [
    "lunes",
    "martes",
    "miércoles",
    "jueves",
    "viernes",
    "sábado",
    "domingo",
];

const MESES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Fixed welcome message for /start
#[must_use]
pub fn welcome_text() -> String {
    "🤖 <b>¡Hola! Soy tu Asistente Inteligente impulsado por Gemini.</b>\n\n\
     Puedo:\n\
     🧠 Responder preguntas complejas.\n\
     🌡️ Darte el clima actual (ej: <i>¿Qué tiempo hace en Tokyo, JP?</i>).\n\
     ➕ Resolver cálculos (ej: <i>¿Cuánto es 500 por 1.15?</i>).\n\n\
     Escribe /help para ver todos los comandos disponibles."
        .to_string()
}

/// Fixed command list for /help
#[must_use]
pub fn help_text() -> String {
    "📋 <b>Lista de Comandos:</b>\n\n\
     /start - Mensaje de bienvenida.\n\
     /help - Muestra esta lista de comandos.\n\
     /fecha - Muestra la fecha y hora actual.\n\
     /clima &lt;ciudad&gt; - Clima actual de una ciudad.\n\
     /saludo [nombre] - Saluda por nombre.\n\n\
     Cualquier otro mensaje será respondido por la IA."
        .to_string()
}

/// Render the localized date/time report for /fecha
#[must_use]
pub fn fecha_text(now: &DateTime<Tz>) -> String {
    let dia = DIAS[now.weekday().num_days_from_monday() as usize];
    let mes = MESES[now.month0() as usize];
    format!(
        "📅 <b>Fecha y Hora Actual</b>\nFecha: {dia}, {:02} de {mes} de {}\nHora: {} (Zona: {})",
        now.day(),
        now.year(),
        now.format("%H:%M:%S"),
        BOT_TIMEZONE
    )
}

/// Render the greeting for /saludo; the name is escaped before embedding
#[must_use]
pub fn saludo_text(nombre: &str) -> String {
    format!(
        "👋 ¡Hola, <b>{}</b>! Encantado de saludarte.",
        html_escape::encode_text(nombre)
    )
}

/// Handle /start
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, welcome_text())
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle /help
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, help_text())
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle /fecha
pub async fn fecha(bot: Bot, msg: Message) -> Result<()> {
    let now = chrono::Utc::now().with_timezone(&BOT_TIMEZONE);
    bot.send_message(msg.chat.id, fecha_text(&now))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle /clima: usage hint without an argument, otherwise the weather
/// tool result verbatim (sanitized for rendering)
pub async fn clima(bot: Bot, msg: Message, registry: Arc<ToolRegistry>, ciudad: &str) -> Result<()> {
    let ciudad = ciudad.trim();
    if ciudad.is_empty() {
        bot.send_message(msg.chat.id, CLIMA_USAGE)
            .parse_mode(ParseMode::Html)
            .await?;
        return Ok(());
    }

    let args = serde_json::json!({ "ciudad": ciudad }).to_string();
    let informe = match registry.execute(weather::TOOL_NAME, &args).await {
        Ok(texto) => texto,
        Err(e) => {
            error!(error = %e, "Weather tool routing failed");
            format!("Ocurrió un error al procesar la solicitud de clima: {e}")
        }
    };

    bot.send_message(msg.chat.id, utils::sanitize_html(&informe))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle /saludo: explicit name argument wins, otherwise the sender's
/// display name
pub async fn saludo(bot: Bot, msg: Message, nombre: &str) -> Result<()> {
    let nombre = nombre.trim();
    let nombre = if nombre.is_empty() {
        msg.from
            .as_ref()
            .map_or_else(|| "amigo".to_string(), |u| u.first_name.clone())
    } else {
        nombre.to_string()
    };

    bot.send_message(msg.chat.id, saludo_text(&nombre))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle any non-command text through the agent pipeline: typing action,
/// dispatch, sanitize, split, send.
pub async fn handle_text(bot: Bot, msg: Message, agent: Arc<AgentDispatcher>) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    bot.send_chat_action(msg.chat.id, ChatAction::Typing)
        .await?;

    let raw = agent.dispatch(text).await;
    let safe = utils::sanitize_html(&raw);

    for part in utils::split_long_message(&safe, TELEGRAM_MAX_MESSAGE_LEN) {
        bot.send_message(msg.chat.id, part)
            .parse_mode(ParseMode::Html)
            .await?;
    }
    Ok(())
}
