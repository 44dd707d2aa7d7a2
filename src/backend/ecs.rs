use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_ecs::Client;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, ContainerOverride, Failure, KeyValuePair, LaunchType,
    NetworkConfiguration, Task, TaskOverride,
};

use super::error::BackendError;
use super::types::{RunRequest, SubUnit, TaskDescriptor, TaskPhase};
use super::ExecutionBackend;
use crate::config::ResolvedConfig;

/// Runs jobs as Fargate tasks on an ECS cluster.
pub struct EcsBackend {
    client: Client,
}

impl EcsBackend {
    /// Build a client from the resolved configuration's region and static
    /// credentials.
    pub async fn from_config(config: &ResolvedConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "vidrelay-config",
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;
        Self::with_client(Client::new(&sdk_config))
    }

    /// Wrap an existing ECS client (custom endpoint, shared config).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecutionBackend for EcsBackend {
    async fn run_execution(&self, req: &RunRequest) -> Result<Vec<String>, BackendError> {
        let assign_public_ip = if req.network.assign_public_ip {
            AssignPublicIp::Enabled
        } else {
            AssignPublicIp::Disabled
        };
        let vpc = AwsVpcConfiguration::builder()
            .set_subnets(Some(req.network.subnets.clone()))
            .set_security_groups(Some(req.network.security_groups.clone()))
            .assign_public_ip(assign_public_ip)
            .build()
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;

        let environment = req
            .environment
            .iter()
            .map(|(name, value)| KeyValuePair::builder().name(name).value(value).build())
            .collect::<Vec<_>>();
        let overrides = TaskOverride::builder()
            .container_overrides(
                ContainerOverride::builder()
                    .name(&req.container_name)
                    .set_environment(Some(environment))
                    .build(),
            )
            .build();

        let output = self
            .client
            .run_task()
            .cluster(&req.cluster)
            .task_definition(&req.task_definition)
            .launch_type(LaunchType::Fargate)
            .count(1)
            .network_configuration(
                NetworkConfiguration::builder()
                    .awsvpc_configuration(vpc)
                    .build(),
            )
            .overrides(overrides)
            .send()
            .await
            .map_err(|e| BackendError::Request(DisplayErrorContext(&e).to_string()))?;

        let handles: Vec<String> = output
            .tasks()
            .iter()
            .filter_map(|t| t.task_arn().map(str::to_string))
            .collect();

        if handles.is_empty() && !output.failures().is_empty() {
            return Err(BackendError::Rejected(describe_failures(output.failures())));
        }
        Ok(handles)
    }

    async fn describe_execution(
        &self,
        cluster: &str,
        handle: &str,
    ) -> Result<Option<TaskDescriptor>, BackendError> {
        let output = self
            .client
            .describe_tasks()
            .cluster(cluster)
            .tasks(handle)
            .send()
            .await
            .map_err(|e| BackendError::Request(DisplayErrorContext(&e).to_string()))?;

        Ok(output.tasks().first().map(descriptor_from_task))
    }
}

fn descriptor_from_task(task: &Task) -> TaskDescriptor {
    TaskDescriptor {
        phase: TaskPhase::parse(task.last_status().unwrap_or_default()),
        stop_code: task.stop_code().map(|c| c.as_str().to_string()),
        stopped_reason: task.stopped_reason().map(str::to_string),
        sub_units: task
            .containers()
            .iter()
            .map(|c| SubUnit {
                name: c.name().map(str::to_string),
                exit_code: c.exit_code(),
                reason: c.reason().map(str::to_string),
            })
            .collect(),
    }
}

fn describe_failures(failures: &[Failure]) -> String {
    failures
        .iter()
        .map(|f| {
            let reason = f.reason().unwrap_or("unknown reason");
            match (f.arn(), f.detail()) {
                (Some(arn), Some(detail)) => format!("{reason} ({arn}): {detail}"),
                (Some(arn), None) => format!("{reason} ({arn})"),
                (None, Some(detail)) => format!("{reason}: {detail}"),
                (None, None) => reason.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
