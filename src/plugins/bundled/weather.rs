//! Weather plugin
//!
//! Mock weather data for any location. Nothing here talks to a weather
//! service; values are random within plausible ranges.

use crate::error::{PluginError, ToolError};
use crate::plugins::{Plugin, PluginMetadata};
use crate::tools::{ParameterSchema, Params, Tool, ToolResult, ToolSchema};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};
use std::future::ready;
use tracing::debug;

const CONDITIONS: [&str; 4] = ["Sunny", "Cloudy", "Rainy", "Snowy"];
const FORECAST_CONDITIONS: [&str; 4] = ["Sunny", "Cloudy", "Rainy", "Partly Cloudy"];

pub struct WeatherPlugin {
    metadata: PluginMetadata,
}

impl WeatherPlugin {
    pub fn new() -> Self {
        Self {
            metadata: PluginMetadata::new(
                "weather",
                "1.0.0",
                "Get weather information for any location",
                "LocalDev Team",
            ),
        }
    }
}

impl Default for WeatherPlugin {
    fn default() -> Self {
        Self::new()
    }
}

fn location_schema() -> ToolSchema {
    ToolSchema::object().required_property(
        "location",
        ParameterSchema::string("City name, state/country, or zip code"),
    )
}

fn current_weather(params: Value) -> Result<ToolResult, ToolError> {
    let location = Params::new(&params).require_str("location")?;
    let mut rng = rand::rng();

    let weather = json!({
        "location": location,
        "temperature": rng.random_range(10..=40),
        "condition": CONDITIONS[rng.random_range(0..CONDITIONS.len())],
        "humidity": rng.random_range(40..=80),
        "windSpeed": rng.random_range(5..=25),
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(ToolResult::success_with_message(
        weather,
        format!("Current weather for {}", location),
    ))
}

fn forecast(params: Value) -> Result<ToolResult, ToolError> {
    let location = Params::new(&params).require_str("location")?;
    let mut rng = rand::rng();
    let today = Utc::now();

    let days: Vec<Value> = (0..3)
        .map(|i| {
            let date = today + chrono::Duration::days(i);
            json!({
                "date": date.format("%Y-%m-%d").to_string(),
                "high": rng.random_range(20..=35),
                "low": rng.random_range(5..=15),
                "condition": FORECAST_CONDITIONS[rng.random_range(0..FORECAST_CONDITIONS.len())],
                "precipitation": rng.random_range(0..=30),
            })
        })
        .collect();

    Ok(ToolResult::success_with_message(
        json!({
            "location": location,
            "forecast": days,
            "timestamp": today.to_rfc3339(),
        }),
        format!("3-day forecast for {}", location),
    ))
}

#[async_trait]
impl Plugin for WeatherPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    async fn on_load(&self) -> Result<(), PluginError> {
        debug!("Weather plugin loaded");
        Ok(())
    }

    async fn on_unload(&self) -> Result<(), PluginError> {
        debug!("Weather plugin unloaded");
        Ok(())
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool::from_fn(
                "get_weather",
                "Get current weather for a location",
                location_schema(),
                |params| ready(current_weather(params)),
            ),
            Tool::from_fn(
                "get_weather_forecast",
                "Get 3-day weather forecast for a location",
                location_schema(),
                |params| ready(forecast(params)),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_weather_shape() {
        let result = current_weather(json!({ "location": "New York" })).unwrap();

        assert!(result.success);
        assert_eq!(result.message.as_deref(), Some("Current weather for New York"));
        let data = result.data.unwrap();
        assert_eq!(data["location"], "New York");
        let temperature = data["temperature"].as_i64().unwrap();
        assert!((10..=40).contains(&temperature));
        assert!(CONDITIONS.contains(&data["condition"].as_str().unwrap()));
        assert!(data["windSpeed"].is_number());
    }

    #[test]
    fn test_current_weather_requires_location() {
        assert!(matches!(
            current_weather(json!({})),
            Err(ToolError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_forecast_has_three_days() {
        let result = forecast(json!({ "location": "Berlin" })).unwrap();
        let data = result.data.unwrap();
        let days = data["forecast"].as_array().unwrap();

        assert_eq!(days.len(), 3);
        for day in days {
            assert_eq!(day["date"].as_str().unwrap().len(), 10);
            assert!(day["high"].as_i64().unwrap() >= day["low"].as_i64().unwrap());
        }
    }

    #[test]
    fn test_tool_names() {
        let names: Vec<String> = WeatherPlugin::new().tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["get_weather", "get_weather_forecast"]);
    }
}
