use crate::client::request_tracker::MAP_INSTANTIATION_LIMIT;
use crate::error::WindshaftError;

/// Base path of the Maps API.
pub const MAPS_API_BASE_URL: &str = "api/v1/map";

/// Connection options of a [`MapsApiClient`](super::MapsApiClient).
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Url of the service with an optional `{user}` placeholder, e.g.
    /// `https://{user}.carto.com`.
    pub url_template: String,
    /// Account name substituted into the url template.
    pub user_name: String,
    /// Name of the template when instantiating a named map.
    pub template_name: Option<String>,
    /// How many times the same request may be performed with the same outcome.
    pub instantiation_limit: u32,
}

impl ClientSettings {
    /// Creates settings for an anonymous map.
    pub fn new(url_template: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            user_name: user_name.into(),
            template_name: None,
            instantiation_limit: MAP_INSTANTIATION_LIMIT,
        }
    }

    /// Switches the settings to the named map with the given template.
    pub fn with_template_name(mut self, template_name: impl Into<String>) -> Self {
        self.template_name = Some(template_name.into());
        self
    }

    /// Base url of the service with the user name substituted.
    pub fn base_url(&self) -> String {
        self.url_template.replace("{user}", &self.user_name)
    }

    /// Returns true if the service is accessed over https.
    pub fn is_secure(&self) -> bool {
        self.url_template.starts_with("https")
    }

    pub(crate) fn validate(&self) -> Result<(), WindshaftError> {
        let mut missing = vec![];
        if self.url_template.is_empty() {
            missing.push("url_template");
        }
        if self.user_name.is_empty() {
            missing.push("user_name");
        }

        if !missing.is_empty() {
            return Err(WindshaftError::Configuration(format!(
                "client could not be initialized, the following options are missing: {}",
                missing.join(", ")
            )));
        }

        if self.instantiation_limit == 0 {
            return Err(WindshaftError::Configuration(
                "instantiation limit must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub(crate) fn endpoints(&self) -> Endpoints {
        match &self.template_name {
            Some(name) => Endpoints {
                get: format!("{MAPS_API_BASE_URL}/named/{name}/jsonp"),
                post: format!("{MAPS_API_BASE_URL}/named/{name}"),
            },
            None => Endpoints {
                get: MAPS_API_BASE_URL.to_string(),
                post: MAPS_API_BASE_URL.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Endpoints {
    pub get: String,
    pub post: String,
}

#[cfg(test)]
mod tests {
    use insta::assert_compact_debug_snapshot;

    use super::*;

    #[test]
    fn missing_options_are_listed() {
        let result = ClientSettings::new("", "").validate();
        assert_compact_debug_snapshot!(result, @r#"Err(Configuration("client could not be initialized, the following options are missing: url_template, user_name"))"#);

        let result = ClientSettings::new("https://{user}.carto.com", "").validate();
        assert_compact_debug_snapshot!(result, @r#"Err(Configuration("client could not be initialized, the following options are missing: user_name"))"#);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let mut settings = ClientSettings::new("https://{user}.carto.com", "acme");
        settings.instantiation_limit = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn base_url_substitutes_user() {
        let settings = ClientSettings::new("https://{user}.carto.com", "acme");
        assert_eq!(settings.base_url(), "https://acme.carto.com");
        assert!(settings.is_secure());
    }

    #[test]
    fn named_map_endpoints() {
        let settings =
            ClientSettings::new("https://{user}.carto.com", "acme").with_template_name("tpl");
        assert_eq!(
            settings.endpoints(),
            Endpoints {
                get: "api/v1/map/named/tpl/jsonp".into(),
                post: "api/v1/map/named/tpl".into(),
            }
        );
    }
}
