use crate::runtime::BindMount;
use crate::runtime::BuildSource;
use crate::runtime::ContainerRuntime;
use crate::runtime::RunRequest;
use crate::runtime::RunningContainer;
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::Config;
use bollard::container::CreateContainerOptions;
use bollard::container::LogOutput;
use bollard::container::LogsOptions;
use bollard::container::RemoveContainerOptions;
use bollard::container::StartContainerOptions;
use bollard::container::WaitContainerOptions;
use bollard::errors::Error as BollardError;
use bollard::image::BuildImageOptions;
use bollard::image::CreateImageOptions;
use bollard::image::RemoveImageOptions;
use bollard::service::HostConfig;
use futures_util::StreamExt;
use std::collections::BTreeMap;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Docker-backed [`ContainerRuntime`] using the Engine API via bollard.
#[derive(Clone)]
pub struct DockerRuntime {
  client: Docker,
}

impl DockerRuntime {
  /// Connects to the daemon, honoring an explicit host address
  /// (`unix://...` or `tcp://`/`http(s)://`) or the platform default.
  pub fn connect(host: Option<&str>) -> Result<Self, BollardError> {
    let client = match host {
      Some(host) if host.starts_with("unix://") => {
        Docker::connect_with_unix(host, 120, bollard::API_DEFAULT_VERSION)?
      }
      Some(host) => Docker::connect_with_http(host, 120, bollard::API_DEFAULT_VERSION)?,
      None => Docker::connect_with_local_defaults()?,
    };
    Ok(Self { client })
  }

  fn generate_container_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("kaprese-{}", &id[..8])
  }

  /// Splits `repo:tag`, leaving registry ports alone; no tag means `latest`.
  fn split_tag(image: &str) -> (&str, &str) {
    match image.rsplit_once(':') {
      Some((repo, tag)) if !tag.contains('/') => (repo, tag),
      _ => (image, "latest"),
    }
  }

  async fn wait_for_exit(client: &Docker, id: &str) -> Option<i64> {
    let options = WaitContainerOptions {
      condition: "not-running",
    };
    let mut stream = client.wait_container(id, Some(options));
    match stream.next().await {
      Some(Ok(response)) => Some(response.status_code),
      // bollard surfaces non-zero exits as a dedicated error variant
      Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Some(code),
      Some(Err(e)) => {
        tracing::debug!("Failed to wait for container \"{}\": {}", id, e);
        None
      }
      None => None,
    }
  }

  async fn remove_container(client: &Docker, id: &str) {
    let options = RemoveContainerOptions {
      force: true,
      ..Default::default()
    };
    if let Err(e) = client.remove_container(id, Some(options)).await {
      tracing::debug!("Failed to remove container \"{}\": {}", id, e);
    }
  }

  fn shell_command(command: &str) -> Vec<String> {
    vec![
      "/bin/bash".to_string(),
      "-c".to_string(),
      command.to_string(),
    ]
  }

  fn binds(mounts: &[BindMount]) -> Option<Vec<String>> {
    if mounts.is_empty() {
      return None;
    }
    Some(
      mounts
        .iter()
        .map(|m| format!("{}:{}", m.source.display(), m.target))
        .collect(),
    )
  }

  /// Packs an inline Dockerfile into the one-entry tar the build endpoint
  /// expects as its context.
  fn dockerfile_tarball(dockerfile: &str) -> Result<Vec<u8>, std::io::Error> {
    let mut header = tar::Header::new_gnu();
    header.set_path("Dockerfile")?;
    header.set_size(dockerfile.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder.append(&header, dockerfile.as_bytes())?;
    builder.into_inner()
  }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
  async fn image_exists(&self, image: &str) -> bool {
    self.client.inspect_image(image).await.is_ok()
  }

  async fn pull_image(&self, image: &str) -> bool {
    let (repo, tag) = Self::split_tag(image);
    tracing::debug!("Pulling image \"{}:{}\"", repo, tag);

    let options = CreateImageOptions {
      from_image: repo,
      tag,
      ..Default::default()
    };
    let mut stream = self.client.create_image(Some(options), None, None);
    while let Some(result) = stream.next().await {
      if let Err(e) = result {
        tracing::debug!("Failed to pull image \"{}\": {}", image, e);
        return false;
      }
    }
    true
  }

  async fn delete_image(&self, image: &str) {
    if !self.image_exists(image).await {
      tracing::debug!("Image \"{}\" does not exist", image);
      return;
    }
    tracing::debug!("Deleting image \"{}\"", image);
    let options = RemoveImageOptions {
      force: false,
      noprune: false,
    };
    if let Err(e) = self.client.remove_image(image, Some(options), None).await {
      tracing::warn!("Failed to delete image \"{}\": {}", image, e);
    }
  }

  async fn build_image(
    &self,
    tag: &str,
    source: BuildSource<'_>,
    build_args: &BTreeMap<String, String>,
    nocache: bool,
  ) -> bool {
    tracing::debug!("Building image \"{}\"", tag);
    tracing::debug!("  source: {:?}", source);
    tracing::debug!("  buildargs: {:?}", build_args);

    let buildargs: HashMap<String, String> = build_args
      .iter()
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect();
    let mut options = BuildImageOptions::<String> {
      dockerfile: "Dockerfile".to_string(),
      t: tag.to_string(),
      nocache,
      rm: true,
      forcerm: true,
      buildargs,
      ..Default::default()
    };

    let body = match source {
      BuildSource::Context(location) => {
        options.remote = location.to_string();
        None
      }
      BuildSource::Dockerfile(dockerfile) => match Self::dockerfile_tarball(dockerfile) {
        Ok(tarball) => Some(tarball.into()),
        Err(e) => {
          tracing::debug!("Failed to pack Dockerfile for \"{}\": {}", tag, e);
          return false;
        }
      },
    };

    let mut stream = self.client.build_image(options, None, body);
    while let Some(result) = stream.next().await {
      match result {
        Ok(info) => {
          if let Some(progress) = info.stream {
            tracing::debug!("Build: {}", progress.trim_end());
          }
          if let Some(error) = info.error {
            tracing::debug!("Failed to build image \"{}\": {}", tag, error);
            return false;
          }
        }
        Err(e) => {
          tracing::debug!("Failed to build image \"{}\": {}", tag, e);
          return false;
        }
      }
    }
    true
  }

  async fn run_probe(&self, image: &str, command: &str) -> Option<String> {
    if !self.image_exists(image).await {
      tracing::debug!("Image \"{}\" does not exist", image);
      return None;
    }

    let config = Config {
      image: Some(image.to_string()),
      cmd: Some(Self::shell_command(command)),
      ..Default::default()
    };
    let options = CreateContainerOptions {
      name: Self::generate_container_name(),
      platform: None,
    };

    let id = match self.client.create_container(Some(options), config).await {
      Ok(response) => response.id,
      Err(e) => {
        tracing::debug!("Failed to run command \"{}\" in image \"{}\": {}", command, image, e);
        return None;
      }
    };

    if let Err(e) = self
      .client
      .start_container(&id, None::<StartContainerOptions<String>>)
      .await
    {
      tracing::debug!("Failed to run command \"{}\" in image \"{}\": {}", command, image, e);
      Self::remove_container(&self.client, &id).await;
      return None;
    }

    let exit_code = Self::wait_for_exit(&self.client, &id).await;

    let log_options = LogsOptions::<String> {
      stdout: true,
      stderr: false,
      ..Default::default()
    };
    let mut output = String::new();
    let mut stream = self.client.logs(&id, Some(log_options));
    while let Some(result) = stream.next().await {
      match result {
        Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
          output.push_str(&String::from_utf8_lossy(&message));
        }
        Ok(_) => {}
        Err(e) => {
          tracing::debug!("Failed to read probe output from \"{}\": {}", image, e);
          Self::remove_container(&self.client, &id).await;
          return None;
        }
      }
    }

    Self::remove_container(&self.client, &id).await;

    match exit_code {
      Some(0) => Some(output.trim().to_string()),
      other => {
        tracing::debug!(
          "Probe \"{}\" in image \"{}\" exited with {:?}",
          command,
          image,
          other
        );
        None
      }
    }
  }

  async fn run_streamed(&self, request: RunRequest) -> Option<RunningContainer> {
    tracing::debug!("Running command stream");
    tracing::debug!("  image: {}", request.image);
    tracing::debug!("  command: {:?}", request.command);
    tracing::debug!("  workdir: {:?}", request.workdir);
    tracing::debug!("  mounts: {:?}", request.mounts);

    if !self.image_exists(&request.image).await {
      tracing::debug!("Image \"{}\" does not exist", request.image);
      return None;
    }

    let host_config = HostConfig {
      binds: Self::binds(&request.mounts),
      ..Default::default()
    };
    let config = Config {
      image: Some(request.image.clone()),
      cmd: request.command.as_deref().map(Self::shell_command),
      working_dir: request.workdir.clone(),
      host_config: Some(host_config),
      ..Default::default()
    };
    let options = CreateContainerOptions {
      name: Self::generate_container_name(),
      platform: None,
    };

    let id = match self.client.create_container(Some(options), config).await {
      Ok(response) => response.id,
      Err(e) => {
        tracing::debug!("Failed to create container for \"{}\": {}", request.image, e);
        return None;
      }
    };

    if let Err(e) = self
      .client
      .start_container(&id, None::<StartContainerOptions<String>>)
      .await
    {
      tracing::debug!("Failed to start container for \"{}\": {}", request.image, e);
      Self::remove_container(&self.client, &id).await;
      return None;
    }

    let (line_tx, line_rx) = mpsc::channel(64);
    let (exit_tx, exit_rx) = oneshot::channel();
    let client = self.client.clone();

    tokio::spawn(async move {
      let log_options = LogsOptions::<String> {
        stdout: true,
        stderr: true,
        follow: true,
        ..Default::default()
      };
      let mut stream = client.logs(&id, Some(log_options));
      let mut buffer = String::new();

      while let Some(result) = stream.next().await {
        let chunk = match result {
          Ok(LogOutput::StdOut { message })
          | Ok(LogOutput::StdErr { message })
          | Ok(LogOutput::Console { message }) => message,
          Ok(_) => continue,
          Err(e) => {
            tracing::debug!("Log stream of container \"{}\" broke: {}", id, e);
            break;
          }
        };
        buffer.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(newline) = buffer.find('\n') {
          let line: String = buffer.drain(..=newline).collect();
          if line_tx.send(line.trim_end().to_string()).await.is_err() {
            // Receiver hung up, keep draining so we still reach the exit code
            break;
          }
        }
      }
      if !buffer.is_empty() {
        let _ = line_tx.send(buffer.trim_end().to_string()).await;
      }
      drop(line_tx);

      let exit_code = Self::wait_for_exit(&client, &id).await;
      Self::remove_container(&client, &id).await;
      let _ = exit_tx.send(exit_code);
    });

    Some(RunningContainer {
      logs: line_rx,
      exit: exit_rx,
    })
  }
}
