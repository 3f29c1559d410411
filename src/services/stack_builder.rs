//! Fluent stack construction.
//!
//! ```
//! use devhost::services::stack_builder::StackBuilder;
//!
//! let mut builder = StackBuilder::new("shop");
//! builder.add_mysql("mysql").add_database("shopdb");
//! builder
//!     .add_container("web", "nginx:1.27")
//!     .with_http_endpoint("http", 80, Some(8080))
//!     .with_http_health_check("/")
//!     .wait_for("mysql");
//! let stack = builder.build().unwrap();
//! assert_eq!(stack.services.len(), 2);
//! ```

use std::path::PathBuf;

use crate::domain::errors::OrchestrationResult;
use crate::domain::models::{
    ContainerLifetime, Endpoint, EnvValue, HealthProbe, LaunchSpec, ParameterSpec,
    ServiceDescriptor, StackDefinition, VolumeMount,
};
use crate::services::dependency_graph::DependencyGraph;

const MYSQL_IMAGE: &str = "mysql:8.4";
const MYSQL_PORT: u16 = 3306;
const PHPMYADMIN_IMAGE: &str = "phpmyadmin:5.2";

/// Accumulates services and parameters of a stack.
#[derive(Debug, Clone)]
pub struct StackBuilder {
    stack: StackDefinition,
}

impl StackBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            stack: StackDefinition::new(name),
        }
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, spec: ParameterSpec) -> &mut Self {
        self.stack.parameters.insert(name.into(), spec);
        self
    }

    /// Container started from a pre-built image.
    pub fn add_container(&mut self, name: &str, image: &str) -> ServiceBuilder<'_> {
        self.push(ServiceDescriptor::image(name, image))
    }

    /// Container built from a Dockerfile in `context`.
    pub fn add_dockerfile(
        &mut self,
        name: &str,
        context: impl Into<PathBuf>,
    ) -> ServiceBuilder<'_> {
        self.push(ServiceDescriptor::new(
            name,
            LaunchSpec::Build {
                context: context.into(),
                dockerfile: None,
            },
        ))
    }

    /// Local process.
    pub fn add_executable(
        &mut self,
        name: &str,
        program: &str,
        args: &[&str],
    ) -> ServiceBuilder<'_> {
        self.push(ServiceDescriptor::new(
            name,
            LaunchSpec::Command {
                program: program.to_string(),
                args: args.iter().map(|a| (*a).to_string()).collect(),
                working_dir: None,
            },
        ))
    }

    /// MySQL server with a generated root password parameter `<name>-password`.
    pub fn add_mysql(&mut self, name: &str) -> ServiceBuilder<'_> {
        let password = format!("{name}-password");
        self.add_parameter(password.clone(), ParameterSpec::generated_secret());
        self.add_container(name, MYSQL_IMAGE)
            .with_environment("MYSQL_ROOT_PASSWORD", EnvValue::parameter(password))
            .with_tcp_endpoint("tcp", MYSQL_PORT, None)
            .with_tcp_health_check(MYSQL_PORT)
    }

    /// Validate the stack and return it.
    pub fn build(self) -> OrchestrationResult<StackDefinition> {
        DependencyGraph::build(self.stack.services.iter().cloned())?;
        Ok(self.stack)
    }

    fn push(&mut self, descriptor: ServiceDescriptor) -> ServiceBuilder<'_> {
        let index = self.stack.services.len();
        self.stack.services.push(descriptor);
        ServiceBuilder {
            stack: &mut self.stack,
            index,
        }
    }
}

/// Configures one service of a [`StackBuilder`].
///
/// Every call edits the stack in place, so the builder may be dropped at any
/// point of a chain.
pub struct ServiceBuilder<'a> {
    stack: &'a mut StackDefinition,
    index: usize,
}

impl ServiceBuilder<'_> {
    fn service(&mut self) -> &mut ServiceDescriptor {
        &mut self.stack.services[self.index]
    }

    pub fn name(&self) -> &str {
        &self.stack.services[self.index].name
    }

    pub fn with_environment(mut self, key: &str, value: impl Into<EnvValue>) -> Self {
        self.service().environment.insert(key.to_string(), value.into());
        self
    }

    /// Environment variable holding `scheme://service:port` of another service's endpoint.
    pub fn with_endpoint_environment(mut self, key: &str, service: &str, endpoint: &str) -> Self {
        self.service()
            .environment
            .insert(key.to_string(), EnvValue::endpoint(service, endpoint));
        self
    }

    pub fn with_http_endpoint(
        mut self,
        name: &str,
        target_port: u16,
        host_port: Option<u16>,
    ) -> Self {
        self.service()
            .endpoints
            .push(Endpoint::http(name, target_port, host_port));
        self
    }

    pub fn with_tcp_endpoint(
        mut self,
        name: &str,
        target_port: u16,
        host_port: Option<u16>,
    ) -> Self {
        self.service()
            .endpoints
            .push(Endpoint::tcp(name, target_port, host_port));
        self
    }

    pub fn with_http_health_check(mut self, path: &str) -> Self {
        self.service().health_probe = Some(HealthProbe::http(path));
        self
    }

    pub fn with_tcp_health_check(mut self, port: u16) -> Self {
        self.service().health_probe = Some(HealthProbe::tcp(port));
        self
    }

    pub fn with_health_probe(mut self, probe: HealthProbe) -> Self {
        self.service().health_probe = Some(probe);
        self
    }

    /// Do not start until `service` is ready.
    pub fn wait_for(mut self, service: &str) -> Self {
        self.service().depends_on.insert(service.to_string());
        self
    }

    /// Consume `service`'s connection details; implies waiting for it.
    pub fn with_reference(mut self, service: &str) -> Self {
        self.service().references.insert(service.to_string());
        self
    }

    pub fn with_lifetime(mut self, lifetime: ContainerLifetime) -> Self {
        self.service().lifetime = lifetime;
        self
    }

    pub fn with_volume(mut self, name: &str, target: &str) -> Self {
        self.service().volumes.push(VolumeMount {
            name: name.to_string(),
            target: target.to_string(),
        });
        self
    }

    /// Named data volume `<stack>-<service>-data`, mounted at the MySQL data
    /// directory for MySQL services and at `/data` otherwise.
    pub fn with_data_volume(self) -> Self {
        let volume = format!("{}-{}-data", self.stack.name, self.stack.services[self.index].name);
        let target = if self.is_mysql() { "/var/lib/mysql" } else { "/data" };
        self.with_volume(&volume, target)
    }

    /// Create `database` when the MySQL server initializes.
    pub fn add_database(self, database: &str) -> Self {
        self.with_environment("MYSQL_DATABASE", database)
    }

    /// Add a phpMyAdmin container pointed at this MySQL server.
    pub fn with_php_my_admin(mut self) -> Self {
        let server = self.name().to_string();
        let admin = ServiceDescriptor {
            environment: [
                ("PMA_HOST".to_string(), EnvValue::literal(server.clone())),
                ("PMA_PORT".to_string(), EnvValue::literal(MYSQL_PORT.to_string())),
            ]
            .into_iter()
            .collect(),
            endpoints: vec![Endpoint::http("http", 80, None)],
            depends_on: [server.clone()].into_iter().collect(),
            ..ServiceDescriptor::image(format!("{server}-phpmyadmin"), PHPMYADMIN_IMAGE)
        };
        self.stack.services.push(admin);
        self
    }

    fn is_mysql(&self) -> bool {
        matches!(
            &self.stack.services[self.index].launch,
            LaunchSpec::Image { image } if image.starts_with("mysql")
        )
    }
}

/// MySQL with phpMyAdmin, an AWS emulator, and a PHP app that waits for both.
pub fn sample_stack() -> OrchestrationResult<StackDefinition> {
    let mut builder = StackBuilder::new("apphost");

    builder
        .add_mysql("mysql")
        .with_data_volume()
        .with_php_my_admin()
        .with_lifetime(ContainerLifetime::Persistent)
        .add_database("mysqldb");

    builder
        .add_container("localstack", "localstack/localstack:latest")
        .with_environment("DEFAULT_REGION", "us-east-1")
        .with_environment("LS_LOG", "error")
        .with_http_endpoint("http", 4566, Some(4566))
        .with_http_health_check("/_localstack/health");

    builder
        .add_dockerfile("phpapp", "./phpapp")
        .with_http_endpoint("http", 80, None)
        .with_environment("DB_HOST", "mysql")
        .with_environment("DB_PORT", "3306")
        .with_environment("DB_NAME", "mysqldb")
        .with_environment("DB_USER", "root")
        .with_environment("DB_PASSWORD", EnvValue::parameter("mysql-password"))
        .with_environment("AWS_ENDPOINT", "http://localstack:4566")
        .with_reference("mysql")
        .wait_for("mysql")
        .wait_for("localstack");

    builder.build()
}
