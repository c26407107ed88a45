use crate::Result;
use crate::config::ComposeSettings;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

const NETWORK: &str = "sonarnet";
const SERVER_PORT: u16 = 9000;
const DB_PORT: u16 = 5432;

/// Two-service compose file: the analysis server and its PostgreSQL database.
#[derive(Debug, Clone, Serialize)]
pub struct ComposeManifest {
    pub services: BTreeMap<String, Service>,
    pub volumes: BTreeMap<String, serde_yaml::Mapping>,
    pub networks: BTreeMap<String, Network>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub image: String,
    pub container_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub restart: String,
    pub ports: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<String>,
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Network {
    pub driver: String,
}

impl ComposeManifest {
    pub fn from_settings(compose: &ComposeSettings) -> Self {
        let restart = format!("on-failure:{}", compose.restart_retries);

        let sonarqube = Service {
            image: compose.sonarqube_image.clone(),
            container_name: format!("{}-sonarqube", compose.project_name),
            depends_on: vec!["db".to_string()],
            restart: restart.clone(),
            ports: vec![format!("{0}:{0}", SERVER_PORT)],
            environment: BTreeMap::from([
                (
                    "SONAR_JDBC_URL".to_string(),
                    format!("jdbc:postgresql://db:{}/{}", DB_PORT, compose.db_name),
                ),
                ("SONAR_JDBC_USERNAME".to_string(), compose.db_user.clone()),
                ("SONAR_JDBC_PASSWORD".to_string(), compose.db_password.clone()),
            ]),
            volumes: vec![
                "sonarqube_data:/opt/sonarqube/data".to_string(),
                "sonarqube_extensions:/opt/sonarqube/extensions".to_string(),
                "sonarqube_logs:/opt/sonarqube/logs".to_string(),
            ],
            networks: vec![NETWORK.to_string()],
        };

        let db = Service {
            image: compose.postgres_image.clone(),
            container_name: format!("{}-db", compose.project_name),
            depends_on: Vec::new(),
            restart,
            ports: vec![format!("{0}:{0}", DB_PORT)],
            environment: BTreeMap::from([
                ("POSTGRES_USER".to_string(), compose.db_user.clone()),
                ("POSTGRES_PASSWORD".to_string(), compose.db_password.clone()),
                ("POSTGRES_DB".to_string(), compose.db_name.clone()),
            ]),
            volumes: vec![
                "postgresql:/var/lib/postgresql".to_string(),
                "postgresql_data:/var/lib/postgresql/data".to_string(),
            ],
            networks: vec![NETWORK.to_string()],
        };

        let volumes = [
            "sonarqube_data",
            "sonarqube_extensions",
            "sonarqube_logs",
            "postgresql",
            "postgresql_data",
        ]
        .into_iter()
        .map(|name| (name.to_string(), serde_yaml::Mapping::new()))
        .collect();

        Self {
            services: BTreeMap::from([
                ("sonarqube".to_string(), sonarqube),
                ("db".to_string(), db),
            ]),
            volumes,
            networks: BTreeMap::from([(
                NETWORK.to_string(),
                Network {
                    driver: "bridge".to_string(),
                },
            )]),
        }
    }

    pub fn render(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.render()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_topology() {
        let manifest = ComposeManifest::from_settings(&ComposeSettings::default());
        let yaml = manifest.render().unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        let server = &doc["services"]["sonarqube"];
        assert_eq!(server["image"].as_str(), Some("sonarqube:lts-community"));
        assert_eq!(server["ports"][0].as_str(), Some("9000:9000"));
        assert_eq!(server["restart"].as_str(), Some("on-failure:3"));
        assert_eq!(server["depends_on"][0].as_str(), Some("db"));
        assert_eq!(
            server["environment"]["SONAR_JDBC_URL"].as_str(),
            Some("jdbc:postgresql://db:5432/sonar")
        );

        let db = &doc["services"]["db"];
        assert_eq!(db["ports"][0].as_str(), Some("5432:5432"));
        assert!(db.get("depends_on").is_none());

        assert!(doc["volumes"].get("postgresql_data").is_some());
        assert_eq!(doc["networks"]["sonarnet"]["driver"].as_str(), Some("bridge"));
    }

    #[test]
    fn test_restart_retries_follow_settings() {
        let compose = ComposeSettings {
            restart_retries: 5,
            ..ComposeSettings::default()
        };
        let manifest = ComposeManifest::from_settings(&compose);
        assert_eq!(manifest.services["db"].restart, "on-failure:5");
    }
}
