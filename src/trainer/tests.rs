use std::io::Cursor;
use std::path::Path;

use super::*;
use crate::dataset::{LabeledExample, write_dataset};
use tempfile::tempdir;

const SVMLIGHT_MODEL: &str = "SVM-light Version V6.02
0 # kernel type
3 # kernel parameter -d
1 # kernel parameter -g
1 # kernel parameter -s
1 # kernel parameter -r
empty# kernel parameter -u
3 # highest feature index
4 # number of training documents
3 # number of support vectors plus 1
-0.25 # threshold b, each following line is a SV (starting with alpha*y)
0.5 1:1 3:2 #
-0.125 2:4 #
";

fn example(label: Label, pairs: &[(u32, f64)]) -> LabeledExample {
    LabeledExample {
        label,
        features: pairs.iter().copied().collect(),
    }
}

fn separable_dataset() -> Dataset {
    Dataset {
        examples: vec![
            example(Label::Positive, &[(1, 2.0), (2, 0.1)]),
            example(Label::Positive, &[(1, 1.5), (2, -0.2)]),
            example(Label::Positive, &[(1, 1.8), (2, 0.3)]),
            example(Label::Negative, &[(1, -2.0), (2, 0.2)]),
            example(Label::Negative, &[(1, -1.6), (2, -0.1)]),
            example(Label::Negative, &[(1, -1.9), (2, 0.0)]),
        ],
    }
}

fn decision(model: &dyn TrainedModel, x: &[f64]) -> f64 {
    let dot: f64 = model
        .support_vectors()
        .iter()
        .map(|sv| {
            sv.weight
                * sv.features
                    .iter()
                    .map(|(index, value)| value * x[index as usize - 1])
                    .sum::<f64>()
        })
        .sum();
    dot - model.bias()
}

#[test]
fn parses_svmlight_model_file() {
    let model = SvmLightModel::parse(Cursor::new(SVMLIGHT_MODEL), Path::new("model.dat")).unwrap();
    assert_eq!(model.kernel(), KernelType::Linear);
    assert_eq!(model.header.highest_feature_index, 3);
    assert_eq!(model.header.training_documents, 4);
    assert_eq!(model.header.custom, "empty");
    assert_eq!(model.bias(), -0.25);
    assert_eq!(model.support_vectors().len(), 2);
    assert_eq!(model.support_vectors()[0].weight, 0.5);
    assert_eq!(model.support_vectors()[0].features.get(3), Some(2.0));
    assert_eq!(model.support_vectors()[1].weight, -0.125);
}

#[test]
fn svmlight_text_survives_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("svmlightmodel.dat");
    let model = SvmLightModel::parse(Cursor::new(SVMLIGHT_MODEL), Path::new("model.dat")).unwrap();
    model.save(&path).unwrap();
    assert_eq!(SvmLightModel::load(&path).unwrap(), model);
}

#[test]
fn svmlight_rejects_truncated_or_inconsistent_models() {
    let truncated = SVMLIGHT_MODEL.lines().take(5).collect::<Vec<_>>().join("\n");
    assert!(matches!(
        SvmLightModel::parse(Cursor::new(truncated), Path::new("model.dat")),
        Err(TrainError::ModelFormat { .. })
    ));

    let missing_sv = SVMLIGHT_MODEL.replace("-0.125 2:4 #\n", "");
    assert!(matches!(
        SvmLightModel::parse(Cursor::new(missing_sv), Path::new("model.dat")),
        Err(TrainError::ModelFormat { .. })
    ));

    let bad_kernel = SVMLIGHT_MODEL.replace("0 # kernel type", "9 # kernel type");
    match SvmLightModel::parse(Cursor::new(bad_kernel), Path::new("model.dat")) {
        Err(TrainError::ModelFormat { line, .. }) => assert_eq!(line, 2),
        other => panic!("expected format error, got {other:?}"),
    }
}

#[test]
fn svm_learn_arguments_use_regression_mode() {
    let trainer = SvmLightTrainer::new(
        Path::new("svm_learn"),
        Hyperparameters::default(),
        Path::new("model.dat"),
    );
    assert_eq!(
        trainer.arguments(),
        ["-z", "r", "-t", "0", "-c", "0.01", "-w", "0.1", "-e", "0.001", "-#", "100000"]
    );
}

#[test]
fn missing_svm_learn_binary_is_a_spawn_error() {
    let dir = tempdir().unwrap();
    let dataset_path = dir.path().join("features.dat");
    write_dataset(&dataset_path, &separable_dataset(), None).unwrap();
    let trainer = SvmLightTrainer::new(
        &dir.path().join("no-such-svm_learn"),
        Hyperparameters::default(),
        &dir.path().join("model.dat"),
    );
    assert!(matches!(
        trainer.fit(&dataset_path),
        Err(TrainError::Spawn { .. })
    ));
}

#[test]
fn rejects_empty_and_single_class_datasets() {
    assert!(matches!(
        check_trainable(&Dataset::default()),
        Err(TrainError::EmptyDataset)
    ));
    let positives = Dataset {
        examples: vec![example(Label::Positive, &[(1, 1.0)])],
    };
    assert!(matches!(
        LinfaTrainer::default().fit_dataset(&positives),
        Err(TrainError::SingleClass {
            label: Label::Positive
        })
    ));
}

#[test]
fn rejects_invalid_hyperparameters() {
    let params = Hyperparameters {
        c: 0.0,
        ..Hyperparameters::default()
    };
    assert!(matches!(
        LinfaTrainer::new(params).fit_dataset(&separable_dataset()),
        Err(TrainError::InvalidHyperparameters(_))
    ));
}

#[test]
fn linfa_separates_simple_dataset() {
    let params = Hyperparameters {
        c: 1.0,
        ..Hyperparameters::default()
    };
    let model = LinfaTrainer::new(params)
        .fit_dataset(&separable_dataset())
        .unwrap();
    assert_eq!(model.kernel(), KernelType::Linear);
    assert_eq!(model.feature_len(), 2);
    assert!(!model.support_vectors().is_empty());
    assert!(decision(&model, &[2.0, 0.0]) > 0.0);
    assert!(decision(&model, &[-2.0, 0.0]) < 0.0);
}

#[test]
fn linfa_model_json_round_trips_through_load_model() {
    let dir = tempdir().unwrap();
    let dataset_path = dir.path().join("features.dat");
    let model_path = dir.path().join("model.json");
    write_dataset(&dataset_path, &separable_dataset(), None).unwrap();
    let params = Hyperparameters {
        c: 1.0,
        ..Hyperparameters::default()
    };
    let trainer = build_trainer(
        TrainerBackend::Linfa,
        params,
        Path::new("svm_learn"),
        &model_path,
    );
    assert_eq!(trainer.name(), "linfa-svm");
    assert_eq!(trainer.backend(), TrainerBackend::Linfa);
    let model = trainer.fit(&dataset_path).unwrap();
    model.save(&model_path).unwrap();

    let loaded = load_model(TrainerBackend::Linfa, &model_path).unwrap();
    assert_eq!(loaded.backend(), "linfa-svm");
    assert_eq!(loaded.bias(), model.bias());
    assert_eq!(loaded.support_vectors(), model.support_vectors());
}

#[test]
fn sigmoid_kernel_is_not_available_in_process() {
    let params = Hyperparameters {
        kernel: KernelType::Sigmoid,
        ..Hyperparameters::default()
    };
    assert!(matches!(
        LinfaTrainer::new(params).fit_dataset(&separable_dataset()),
        Err(TrainError::UnsupportedKernel { .. })
    ));
}

#[test]
fn backend_names_parse_case_insensitively() {
    assert_eq!(TrainerBackend::parse("Linfa"), Some(TrainerBackend::Linfa));
    assert_eq!(
        TrainerBackend::parse("svm-light"),
        Some(TrainerBackend::SvmLight)
    );
    assert_eq!(TrainerBackend::parse("libsvm"), None);
}
