//! Scheduler job descriptors: the N-way parallel job and the optional
//! "run, then reduce" two-stage description.

use crate::config::Requirement;
use crate::naming::{RunLayout, PROCESS_MACRO};
use crate::McError;
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Node name of the parallel stage inside the two-stage descriptor.
pub const STAGE_NAME: &str = "A";

/// Post-processing stage settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceStage {
    /// Command that runs the reducer, e.g. `/opt/bin/mrmc`.
    pub reducer: String,
    pub clean: bool,
    pub prepend: bool,
}

/// Which auxiliary files travel with each worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSelection {
    /// Files in the work dir whose name ends in one of `extensions` and contains one of `modules`.
    Matching {
        modules: Vec<String>,
        extensions: Vec<String>,
    },
    Explicit(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Worker script, relative to the work dir or absolute.
    pub script: String,
    /// Interpreter to launch the script with; `None` runs the script directly.
    pub interpreter: Option<String>,
    /// Signed so that a bad count is reported rather than unrepresentable.
    pub njobs: i64,
    pub transfer: TransferSelection,
    pub requirement: Option<Requirement>,
    /// Worker arguments the mapper does not interpret.
    pub forward_args: Vec<String>,
    /// The invocation being recorded, written as the descriptor's first line.
    pub command_line: String,
    pub reduce: Option<ReduceStage>,
}

/// Rendered descriptors, not yet on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptors {
    pub job_path: PathBuf,
    pub job: String,
    pub dag: Option<(PathBuf, String)>,
}

impl JobDescriptors {
    pub fn write(&self) -> Result<Vec<PathBuf>, McError> {
        let mut written = vec![self.job_path.clone()];
        fs::write(&self.job_path, &self.job).map_err(|e| McError::file_access(&self.job_path, e))?;
        if let Some((path, body)) = &self.dag {
            fs::write(path, body).map_err(|e| McError::file_access(path, e))?;
            written.push(path.clone());
        }
        for path in &written {
            info!(path = %path.display(), "descriptor written");
        }
        Ok(written)
    }

    /// Shell command that hands the descriptors to the scheduler.
    pub fn launch_command(&self) -> String {
        match &self.dag {
            Some((path, _)) => format!(
                "condor_submit_dag -notification Never {}",
                file_name(path)
            ),
            None => format!("condor_submit {}", file_name(&self.job_path)),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn resolve(layout: &RunLayout, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        layout.work_dir.join(path)
    }
}

/// Work-dir files matching an extension and a module name, sorted.
pub fn select_transfer_files(
    dir: &Path,
    modules: &[String],
    extensions: &[String],
) -> Result<Vec<String>, McError> {
    if modules.is_empty() {
        return Ok(Vec::new());
    }
    let mut selected = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| McError::file_access(dir, e))? {
        let entry = entry.map_err(|e| McError::file_access(dir, e))?;
        if !entry.path().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let ext_ok = extensions.iter().any(|ext| name.ends_with(ext.as_str()));
        let module_ok = modules.iter().any(|m| name.contains(m.as_str()));
        if ext_ok && module_ok {
            selected.push(name);
        }
    }
    selected.sort();
    Ok(selected)
}

fn transfer_list(layout: &RunLayout, request: &JobRequest) -> Result<Vec<String>, McError> {
    let mut files = match &request.transfer {
        TransferSelection::Matching { modules, extensions } => {
            select_transfer_files(&layout.work_dir, modules, extensions)?
        }
        TransferSelection::Explicit(list) => {
            for name in list {
                if !resolve(layout, name).is_file() {
                    return Err(McError::Configuration(format!(
                        "transfer file '{}' does not exist",
                        name
                    )));
                }
            }
            list.clone()
        }
    };
    files.retain(|f| f != &request.script);
    files.push(request.script.clone());
    Ok(files)
}

/// Validate a request and render its descriptor(s).
pub fn build(layout: &RunLayout, request: &JobRequest) -> Result<JobDescriptors, McError> {
    if request.njobs <= 0 {
        return Err(McError::Configuration(format!(
            "process count must be positive, got {}",
            request.njobs
        )));
    }
    let njobs = request.njobs as usize;

    let script_path = resolve(layout, &request.script);
    if !script_path.is_file() {
        return Err(McError::Configuration(format!(
            "target script '{}' does not exist",
            script_path.display()
        )));
    }
    if request.forward_args.iter().any(|a| a.contains('\n')) {
        return Err(McError::Configuration(
            "forwarded arguments must not contain newlines".to_string(),
        ));
    }

    let transfer = transfer_list(layout, request)?;
    debug!(files = ?transfer, "transfer list");

    let mut job = String::new();
    job.push_str(&format!("# {}\n", request.command_line.replace('\n', " ")));
    job.push_str("should_transfer_files = YES\n");
    job.push_str("when_to_transfer_output = ON_EXIT\n");
    job.push_str("notification = never\n");
    job.push_str("universe = vanilla\n");
    job.push_str(&format!("opts = {}\n", request.forward_args.iter().join(" ")));
    if let Some(req) = &request.requirement {
        job.push_str(&format!("requirements = {}\n", req));
    }
    job.push_str(&format!("transfer_input_files = {}\n", transfer.iter().join(",")));

    let worker_args = format!(
        "--header={} $(opts) --process={}",
        layout.header, PROCESS_MACRO
    );
    match &request.interpreter {
        Some(interpreter) => {
            job.push_str(&format!("executable = {}\n", interpreter));
            job.push_str(&format!("arguments = {} {}\n", request.script, worker_args));
        }
        None => {
            job.push_str(&format!("executable = {}\n", request.script));
            job.push_str(&format!("arguments = {}\n", worker_args));
        }
    }
    job.push_str(&format!("output = {}\n", layout.capture_template("out")));
    job.push_str(&format!("error = {}\n", layout.capture_template("err")));
    job.push_str(&format!("queue {}\n", njobs));

    let dag = request.reduce.as_ref().map(|stage| {
        let clean = if stage.clean { "--clean" } else { "--no-clean" };
        let prepend = if stage.prepend { " --prepend" } else { "" };
        let body = format!(
            "JOB {STAGE_NAME} {}\nSCRIPT POST {STAGE_NAME} {} reduce --header={} --njobs={} {}{}\n",
            layout.job_descriptor_name(),
            stage.reducer,
            layout.header,
            njobs,
            clean,
            prepend
        );
        (layout.dag_descriptor_path(), body)
    });

    Ok(JobDescriptors {
        job_path: layout.job_descriptor_path(),
        job,
        dag,
    })
}
