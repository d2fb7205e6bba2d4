//! Weather tool
//!
//! Wraps the OpenWeatherMap current-weather endpoint. Every failure mode is
//! converted into displayable text at this boundary; callers (the agent and
//! the /clima command) treat the return value as always-renderable.

use super::ToolProvider;
use crate::config::HTTP_TIMEOUT_SECS;
use crate::llm::ToolDefinition;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

/// Tool name registered with the agent
pub const TOOL_NAME: &str = "clima";

/// Fixed string returned when the provider credential is missing
pub const CONFIG_ERROR: &str = "ERROR: La clave de OpenWeatherMap no está configurada.";

const NOT_FOUND_FALLBACK: &str = "Ciudad no encontrada.";
const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// Tool provider for the weather lookup
pub struct WeatherProvider {
    http_client: HttpClient,
    api_key: Option<String>,
    base_url: String,
}

/// Arguments for the weather tool
#[derive(Debug, Deserialize)]
struct WeatherArgs {
    ciudad: String,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    // OpenWeatherMap returns `cod` as a number on success and as a string
    // on some error payloads.
    cod: serde_json::Value,
    message: Option<String>,
    main: Option<MainData>,
    weather: Option<Vec<ConditionData>>,
}

#[derive(Debug, Deserialize)]
struct MainData {
    temp: f64,
    feels_like: f64,
    humidity: i64,
}

#[derive(Debug, Deserialize)]
struct ConditionData {
    description: String,
}

fn cod_value(cod: &serde_json::Value) -> Option<i64> {
    cod.as_i64().or_else(|| cod.as_str()?.parse().ok())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

/// Render the provider payload into the fixed report template, or into an
/// error string when the payload signals a failure.
fn report(ciudad: &str, data: &WeatherResponse) -> String {
    if cod_value(&data.cod) != Some(200) {
        return format!(
            "Error al obtener el clima: {}",
            data.message.as_deref().unwrap_or(NOT_FOUND_FALLBACK)
        );
    }

    let (Some(main), Some(condition)) = (&data.main, data.weather.as_ref().and_then(|w| w.first()))
    else {
        return format!(
            "Ocurrió un error al procesar la solicitud de clima: respuesta incompleta para {ciudad}"
        );
    };

    format!(
        "El clima en {ciudad} es:\n\
         🌡️ Temperatura: {}°C (sensación térmica {}°C)\n\
         ☁️ Condición: {}\n\
         💧 Humedad: {}%",
        main.temp,
        main.feels_like,
        capitalize(&condition.description),
        main.humidity
    )
}

impl WeatherProvider {
    /// Create a provider against the public OpenWeatherMap endpoint
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a provider pointing at a custom base URL (used by tests)
    #[must_use]
    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            base_url,
        }
    }

    async fn fetch(&self, key: &str, ciudad: &str) -> Result<WeatherResponse, reqwest::Error> {
        // Error payloads arrive with non-2xx statuses but still carry the
        // `cod`/`message` body, so the status itself is not checked here.
        self.http_client
            .get(format!("{}/data/2.5/weather", self.base_url))
            .query(&[
                ("q", ciudad),
                ("appid", key),
                ("units", "metric"),
                ("lang", "es"),
            ])
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .send()
            .await?
            .json()
            .await
    }

    /// Look up the current weather for a location string.
    ///
    /// Always returns displayable text, never an error.
    pub async fn lookup(&self, ciudad: &str) -> String {
        let Some(key) = &self.api_key else {
            return CONFIG_ERROR.to_string();
        };

        match self.fetch(key, ciudad).await {
            Ok(data) => report(ciudad, &data),
            Err(e) => {
                warn!(ciudad = %ciudad, error = %e, "Weather request failed");
                format!("Ocurrió un error al procesar la solicitud de clima: {e}")
            }
        }
    }
}

#[async_trait]
impl ToolProvider for WeatherProvider {
    fn name(&self) -> &'static str {
        "weather"
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: "Útil para responder preguntas sobre el clima y la temperatura actual en cualquier ciudad. Usar el formato 'Ciudad, Código de País', ej. 'Paris, FR'.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "ciudad": {
                        "type": "string",
                        "description": "Ciudad y código de país, ej. 'Paris, FR'"
                    }
                },
                "required": ["ciudad"]
            }),
        }]
    }

    fn can_handle(&self, tool_name: &str) -> bool {
        tool_name == TOOL_NAME
    }

    async fn execute(&self, _tool_name: &str, arguments: &str) -> Result<String> {
        let args: WeatherArgs = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return Ok(format!("Error al interpretar los argumentos: {e}")),
        };
        Ok(self.lookup(&args.ciudad).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn success_body() -> serde_json::Value {
        json!({
            "cod": 200,
            "main": { "temp": 18.3, "feels_like": 17.1, "humidity": 72 },
            "weather": [{ "description": "cielo claro" }]
        })
    }

    #[tokio::test]
    async fn test_lookup_success_renders_report() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Paris, FR"))
            .and(query_param("units", "metric"))
            .and(query_param("lang", "es"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
            .mount(&server)
            .await;

        let provider = WeatherProvider::with_base_url(Some("k".to_string()), server.uri());
        let out = provider.lookup("Paris, FR").await;

        assert!(out.contains("El clima en Paris, FR"));
        assert!(out.contains("18.3°C"));
        assert!(out.contains("sensación térmica 17.1°C"));
        assert!(out.contains("Cielo claro"));
        assert!(out.contains("72%"));
    }

    #[tokio::test]
    async fn test_lookup_not_found_embeds_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&server)
            .await;

        let provider = WeatherProvider::with_base_url(Some("k".to_string()), server.uri());
        let out = provider.lookup("Nowhere").await;
        assert_eq!(out, "Error al obtener el clima: city not found");
    }

    #[tokio::test]
    async fn test_lookup_not_found_without_message_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "cod": "404" })))
            .mount(&server)
            .await;

        let provider = WeatherProvider::with_base_url(Some("k".to_string()), server.uri());
        let out = provider.lookup("Nowhere").await;
        assert_eq!(out, "Error al obtener el clima: Ciudad no encontrada.");
    }

    #[tokio::test]
    async fn test_lookup_without_key_is_deterministic() {
        let provider = WeatherProvider::new(None);
        assert_eq!(provider.lookup("Paris, FR").await, CONFIG_ERROR);
        assert_eq!(provider.lookup("").await, CONFIG_ERROR);
    }

    #[tokio::test]
    async fn test_lookup_unreachable_host_returns_text() {
        // Nothing listens on this port; the tool must still answer with text.
        let provider = WeatherProvider::with_base_url(
            Some("k".to_string()),
            "http://127.0.0.1:1".to_string(),
        );
        let out = provider.lookup("Paris, FR").await;
        assert!(out.starts_with("Ocurrió un error al procesar la solicitud de clima"));
    }

    #[tokio::test]
    async fn test_execute_parses_tool_args() -> anyhow::Result<()> {
        let provider = WeatherProvider::new(None);

        let out = provider
            .execute(TOOL_NAME, "{\"ciudad\": \"Paris, FR\"}")
            .await?;
        assert_eq!(out, CONFIG_ERROR);

        let bad = provider.execute(TOOL_NAME, "{}").await?;
        assert!(bad.starts_with("Error al interpretar los argumentos"));
        Ok(())
    }

    #[test]
    fn test_report_incomplete_payload() {
        let data = WeatherResponse {
            cod: json!(200),
            message: None,
            main: None,
            weather: None,
        };
        assert!(report("Lima, PE", &data).starts_with("Ocurrió un error"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("cielo claro"), "Cielo claro");
        assert_eq!(capitalize(""), "");
    }
}
