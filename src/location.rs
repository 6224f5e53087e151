//! One-shot user location lookup.
//!
//! The viewer only needs a single fix to place the user-location dot, so the
//! lookup is a one-shot asynchronous request that resolves exactly once:
//! with a fix, a timeout, or a failure reason.

use crate::CLIENT;
use crate::projection::GeoPos;
use log::debug;
use poll_promise::Promise;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors from a location request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    /// No fix arrived within the request timeout.
    #[error("The location request timed out")]
    TimedOut,

    /// The location could not be determined.
    #[error("The location could not be determined: {0}")]
    Unavailable(String),
}

/// A source of a single location fix.
///
/// Sources are passed explicitly to whoever needs a location, so tests can
/// substitute a fake source for the network-backed one.
pub trait LocationSource: Send + 'static {
    /// Blocks until a fix is available or the lookup fails.
    fn locate(&self) -> Result<GeoPos, LocationError>;
}

/// Requests a single location fix on a background thread.
///
/// The returned promise resolves exactly once. Dropping the promise abandons
/// the request, which ties its lifetime to whoever owns it.
pub fn request_location<S: LocationSource>(source: S) -> Promise<Result<GeoPos, LocationError>> {
    Promise::spawn_thread("locate", move || source.locate())
}

/// A location source backed by an IP-geolocation web service.
pub struct IpLocationSource {
    endpoint: String,
    timeout: Duration,
}

impl Default for IpLocationSource {
    fn default() -> Self {
        Self {
            endpoint: "http://ip-api.com/json".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl IpLocationSource {
    /// Creates a source that queries the given endpoint.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct IpLocationResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
}

impl LocationSource for IpLocationSource {
    fn locate(&self) -> Result<GeoPos, LocationError> {
        debug!("Requesting location from {}", &self.endpoint);
        let response = CLIENT
            .get(&self.endpoint)
            .timeout(self.timeout)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LocationError::TimedOut
                } else {
                    LocationError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LocationError::Unavailable(response.status().to_string()));
        }

        let text = response
            .text()
            .map_err(|e| LocationError::Unavailable(e.to_string()))?;
        let parsed: IpLocationResponse =
            serde_json::from_str(&text).map_err(|e| LocationError::Unavailable(e.to_string()))?;

        if parsed.status != "success" {
            let reason = parsed.message.unwrap_or(parsed.status);
            return Err(LocationError::Unavailable(reason));
        }

        Ok(GeoPos {
            lon: parsed.lon,
            lat: parsed.lat,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSource(Result<GeoPos, LocationError>);

    impl LocationSource for FakeSource {
        fn locate(&self) -> Result<GeoPos, LocationError> {
            self.0.clone()
        }
    }

    #[test]
    fn request_location_resolves_with_the_fix() {
        let promise = request_location(FakeSource(Ok(GeoPos {
            lon: 102.0,
            lat: 0.5,
        })));

        let result = promise.block_until_ready();

        assert_eq!(
            result,
            &Ok(GeoPos {
                lon: 102.0,
                lat: 0.5
            })
        );
    }

    #[test]
    fn request_location_resolves_with_the_failure() {
        let promise = request_location(FakeSource(Err(LocationError::Unavailable(
            "no signal".to_string(),
        ))));

        let result = promise.block_until_ready();

        assert_eq!(
            result,
            &Err(LocationError::Unavailable("no signal".to_string()))
        );
    }

    #[test]
    fn ip_response_deserializes() {
        let parsed: IpLocationResponse =
            serde_json::from_str(r#"{"status": "success", "lat": 60.17, "lon": 24.94}"#).unwrap();
        assert_eq!(parsed.status, "success");
        assert_eq!(parsed.lat, 60.17);
        assert_eq!(parsed.lon, 24.94);

        let failed: IpLocationResponse =
            serde_json::from_str(r#"{"status": "fail", "message": "private range"}"#).unwrap();
        assert_eq!(failed.status, "fail");
        assert_eq!(failed.message.as_deref(), Some("private range"));
    }
}
