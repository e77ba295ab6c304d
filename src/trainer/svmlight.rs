//! SVMlight backend: runs `svm_learn` and reads its text model.
//!
//! Model file layout (one value per header line, `# comment` trailing):
//!
//! ```text
//! SVM-light Version V6.02
//! 0 # kernel type
//! 3 # kernel parameter -d
//! 1 # kernel parameter -g
//! 1 # kernel parameter -s
//! 1 # kernel parameter -r
//! empty# kernel parameter -u
//! 3780 # highest feature index
//! 2416 # number of training documents
//! 1201 # number of support vectors plus 1
//! 0.1 # threshold b, each following line is a SV (starting with alpha*y)
//! 0.01 1:0.25 2:0.5 ... #
//! ```

use std::fmt::Write as _;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::dataset::{parse_features, read_dataset};
use crate::locale;

use super::{
    Hyperparameters, KernelType, SupportVector, TrainError, TrainedModel, Trainer,
    TrainerBackend, check_trainable,
};

const BACKEND_NAME: &str = "svmlight";
const VERSION_PREFIX: &str = "SVM-light Version";

/// Header values of an SVMlight model file.
#[derive(Clone, Debug, PartialEq)]
pub struct SvmLightHeader {
    pub version: String,
    pub kernel: KernelType,
    pub poly_degree: i64,
    pub rbf_gamma: f64,
    pub coef_lin: f64,
    pub coef_const: f64,
    pub custom: String,
    pub highest_feature_index: usize,
    pub training_documents: usize,
    /// Threshold `b`; decision values are `sum(alpha_i y_i K(x_i, x)) - b`.
    pub threshold: f64,
}

/// Parsed SVMlight model.
#[derive(Clone, Debug, PartialEq)]
pub struct SvmLightModel {
    pub header: SvmLightHeader,
    pub support_vectors: Vec<SupportVector>,
}

impl SvmLightModel {
    pub fn load(path: &Path) -> Result<Self, TrainError> {
        let file = std::fs::File::open(path).map_err(|source| TrainError::ModelIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(BufReader::new(file), path)
    }

    /// Parse a model from any reader; `origin` labels errors.
    pub fn parse<R: BufRead>(reader: R, origin: &Path) -> Result<Self, TrainError> {
        let mut lines = reader.lines().enumerate().map(|(idx, line)| {
            line.map(|text| (idx + 1, text))
                .map_err(|source| TrainError::ModelIo {
                    path: origin.to_path_buf(),
                    source,
                })
        });
        let mut next_header = |what: &str| -> Result<(usize, String), TrainError> {
            match lines.next() {
                Some(line) => {
                    let (number, text) = line?;
                    let value = text.split_once('#').map_or(text.as_str(), |(v, _)| v);
                    Ok((number, value.trim().to_string()))
                }
                None => Err(format_error(origin, 0, format!("missing {what}"))),
            }
        };

        let (number, version) = next_header("version line")?;
        if !version.starts_with(VERSION_PREFIX) {
            return Err(format_error(
                origin,
                number,
                format!("expected '{VERSION_PREFIX}', found '{version}'"),
            ));
        }
        let (number, value) = next_header("kernel type")?;
        let code: i64 = parse_value(origin, number, &value, "kernel type")?;
        let kernel = KernelType::from_svmlight_code(code)
            .ok_or_else(|| format_error(origin, number, format!("unknown kernel type {code}")))?;
        let (number, value) = next_header("polynomial degree")?;
        let poly_degree = parse_value(origin, number, &value, "polynomial degree")?;
        let (number, value) = next_header("rbf gamma")?;
        let rbf_gamma = parse_value(origin, number, &value, "rbf gamma")?;
        let (number, value) = next_header("linear coefficient")?;
        let coef_lin = parse_value(origin, number, &value, "linear coefficient")?;
        let (number, value) = next_header("constant coefficient")?;
        let coef_const = parse_value(origin, number, &value, "constant coefficient")?;
        let (_, custom) = next_header("custom kernel parameter")?;
        let (number, value) = next_header("highest feature index")?;
        let highest_feature_index = parse_value(origin, number, &value, "highest feature index")?;
        let (number, value) = next_header("number of training documents")?;
        let training_documents = parse_value(origin, number, &value, "document count")?;
        let (number, value) = next_header("support vector count")?;
        let count_plus_one: usize = parse_value(origin, number, &value, "support vector count")?;
        let (number, value) = next_header("threshold")?;
        let threshold = parse_value(origin, number, &value, "threshold")?;

        let expected = count_plus_one.saturating_sub(1);
        let mut support_vectors = Vec::with_capacity(expected);
        for line in lines.by_ref() {
            let (number, text) = line?;
            let data = text.split_once('#').map_or(text.as_str(), |(v, _)| v);
            let mut tokens = data.split_whitespace();
            let Some(weight_text) = tokens.next() else {
                continue;
            };
            let weight: f64 = parse_value(origin, number, weight_text, "alpha*y")?;
            let features = parse_features(tokens)
                .map_err(|kind| format_error(origin, number, kind.to_string()))?;
            support_vectors.push(SupportVector { weight, features });
        }
        if support_vectors.len() != expected {
            return Err(format_error(
                origin,
                0,
                format!(
                    "header announces {expected} support vectors, found {}",
                    support_vectors.len()
                ),
            ));
        }

        Ok(Self {
            header: SvmLightHeader {
                version,
                kernel,
                poly_degree,
                rbf_gamma,
                coef_lin,
                coef_const,
                custom,
                highest_feature_index,
                training_documents,
                threshold,
            },
            support_vectors,
        })
    }

    /// Render the model in SVMlight's text format.
    pub fn to_text(&self) -> String {
        let header = &self.header;
        let mut out = String::new();
        let _ = writeln!(out, "{}", header.version);
        let _ = writeln!(out, "{} # kernel type", header.kernel.svmlight_code());
        let _ = writeln!(out, "{} # kernel parameter -d", header.poly_degree);
        let _ = writeln!(out, "{} # kernel parameter -g", header.rbf_gamma);
        let _ = writeln!(out, "{} # kernel parameter -s", header.coef_lin);
        let _ = writeln!(out, "{} # kernel parameter -r", header.coef_const);
        let _ = writeln!(out, "{}# kernel parameter -u", header.custom);
        let _ = writeln!(out, "{} # highest feature index", header.highest_feature_index);
        let _ = writeln!(out, "{} # number of training documents", header.training_documents);
        let _ = writeln!(
            out,
            "{} # number of support vectors plus 1",
            self.support_vectors.len() + 1
        );
        let _ = writeln!(
            out,
            "{} # threshold b, each following line is a SV (starting with alpha*y)",
            header.threshold
        );
        for sv in &self.support_vectors {
            let _ = write!(out, "{}", sv.weight);
            for (index, value) in sv.features.iter() {
                let _ = write!(out, " {index}:{value}");
            }
            out.push_str(" #\n");
        }
        out
    }
}

impl TrainedModel for SvmLightModel {
    fn backend(&self) -> &str {
        BACKEND_NAME
    }

    fn kernel(&self) -> KernelType {
        self.header.kernel
    }

    fn support_vectors(&self) -> &[SupportVector] {
        &self.support_vectors
    }

    fn bias(&self) -> f64 {
        self.header.threshold
    }

    fn feature_len(&self) -> usize {
        self.header.highest_feature_index
    }

    fn save(&self, path: &Path) -> Result<(), TrainError> {
        crate::atomic_file::write_atomic(path, self.to_text().as_bytes()).map_err(|source| {
            TrainError::ModelIo {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}

/// Trains by running an external `svm_learn` in regression mode.
#[derive(Clone, Debug)]
pub struct SvmLightTrainer {
    program: PathBuf,
    params: Hyperparameters,
    model_path: PathBuf,
}

impl SvmLightTrainer {
    pub fn new(program: &Path, params: Hyperparameters, model_path: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            params,
            model_path: model_path.to_path_buf(),
        }
    }

    /// Command-line options passed before the dataset and model paths.
    pub fn arguments(&self) -> Vec<String> {
        let params = &self.params;
        let mut args = vec![
            "-z".to_string(),
            "r".to_string(),
            "-t".to_string(),
            params.kernel.svmlight_code().to_string(),
            "-c".to_string(),
            params.c.to_string(),
            "-w".to_string(),
            params.epsilon.to_string(),
            "-e".to_string(),
            params.tolerance.to_string(),
            "-#".to_string(),
            params.max_iterations.to_string(),
        ];
        match params.kernel {
            KernelType::Polynomial => {
                args.extend(["-d".to_string(), params.degree.to_string()]);
                args.extend(["-r".to_string(), params.coef0.to_string()]);
            }
            KernelType::Rbf => args.extend(["-g".to_string(), params.gamma.to_string()]),
            KernelType::Sigmoid => args.extend(["-r".to_string(), params.coef0.to_string()]),
            KernelType::Linear | KernelType::Custom => {}
        }
        args
    }
}

impl Trainer for SvmLightTrainer {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn backend(&self) -> TrainerBackend {
        TrainerBackend::SvmLight
    }

    fn fit(&self, dataset_path: &Path) -> Result<Box<dyn TrainedModel>, TrainError> {
        self.params.validate()?;
        check_trainable(&read_dataset(dataset_path)?)?;
        if let Some(parent) = self.model_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| TrainError::ModelIo {
                path: self.model_path.clone(),
                source,
            })?;
        }

        let mut command = Command::new(&self.program);
        command
            .args(self.arguments())
            .arg(dataset_path)
            .arg(&self.model_path);
        locale::apply_numeric_locale(&mut command);
        info!(
            "Running {} on {}",
            self.program.display(),
            dataset_path.display()
        );
        let output = command.output().map_err(|source| TrainError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!("svm_learn: {line}");
        }
        if !output.status.success() {
            return Err(TrainError::ProcessFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let model = SvmLightModel::load(&self.model_path)?;
        info!(
            "{BACKEND_NAME} finished: {} support vectors, b={}",
            model.support_vectors.len(),
            model.header.threshold
        );
        Ok(Box::new(model))
    }
}

fn parse_value<T: std::str::FromStr>(
    origin: &Path,
    line: usize,
    text: &str,
    what: &str,
) -> Result<T, TrainError> {
    text.parse()
        .map_err(|_| format_error(origin, line, format!("invalid {what} '{text}'")))
}

fn format_error(origin: &Path, line: usize, message: String) -> TrainError {
    TrainError::ModelFormat {
        path: origin.to_path_buf(),
        line,
        message,
    }
}
