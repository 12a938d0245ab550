use sbal_common::EnvVars;

pub struct ApiServerEnv {
    pub port: String,
    pub client_url: String,
}

impl EnvVars for ApiServerEnv {
    fn load() -> Self {
        Self {
            port: std::env::var("PORT").unwrap_or_else(|_| "5000".to_string()),
            client_url: std::env::var("CLIENT_URL").unwrap_or_else(|_| "*".to_string()),
        }
    }

    fn get_env_var(&self, key: &str) -> String {
        match key {
            "PORT" => self.port.clone(),
            "CLIENT_URL" => self.client_url.clone(),
            _ => panic!("{} is not set", key),
        }
    }
}
