use approx::assert_abs_diff_eq;
use ndarray::{s, Array1, Array2, Axis};
use scaled_pca::matrix::from_rows;
use scaled_pca::{
    PcaError, PcaProjector, StandardizedPca, Standardizer, StandardizerConfig, SvdSolver,
    VarianceConvention,
};
use std::error::Error;
use std::path::Path;

const N_SAMPLES: usize = 569;
const N_FEATURES: usize = 30;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Wisconsin diagnostic breast cancer features, one sample per line, no header.
fn load_breast_cancer() -> Result<Array2<f64>, Box<dyn Error>> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/breast_cancer.csv");
    let text = std::fs::read_to_string(path)?;
    let rows = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split(',')
                .map(|field| field.trim().parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(from_rows(&rows)?)
}

#[test]
fn test_dataset_shape() -> Result<(), Box<dyn Error>> {
    let data = load_breast_cancer()?;
    assert_eq!(data.dim(), (N_SAMPLES, N_FEATURES));
    assert_abs_diff_eq!(data[[0, 0]], 17.99, epsilon = 1e-9);
    Ok(())
}

#[test]
fn test_golden_first_row_two_components() -> Result<(), Box<dyn Error>> {
    init_logging();
    let data = load_breast_cancer()?;

    let mut scaler = Standardizer::new();
    let z = scaler.fit_transform(data.view())?;
    let mut pca = PcaProjector::new();
    let scores = pca.fit_transform(z.view(), 2)?;

    assert_eq!(scores.dim(), (N_SAMPLES, 2));
    assert_abs_diff_eq!(scores[[0, 0]], 9.192837, epsilon = 1e-3);
    assert_abs_diff_eq!(scores[[0, 1]], 1.948583, epsilon = 1e-3);
    assert_abs_diff_eq!(scores[[1, 0]], 2.387802, epsilon = 1e-3);
    assert_abs_diff_eq!(scores[[1, 1]], -3.768172, epsilon = 1e-3);
    Ok(())
}

#[test]
fn test_pipeline_matches_manual_stages() -> Result<(), Box<dyn Error>> {
    let data = load_breast_cancer()?;

    let mut model = StandardizedPca::new();
    let pipeline_scores = model.fit_transform(data.view(), 2)?;

    let z = Standardizer::new().fit_transform(data.view())?;
    let manual_scores = PcaProjector::new().fit_transform(z.view(), 2)?;

    assert_abs_diff_eq!(pipeline_scores, manual_scores, epsilon = 1e-10);
    assert_abs_diff_eq!(model.transform(data.view())?, pipeline_scores, epsilon = 1e-10);
    Ok(())
}

#[test]
fn test_explained_variance_on_dataset() -> Result<(), Box<dyn Error>> {
    let data = load_breast_cancer()?;
    let mut model = StandardizedPca::new();
    model.fit(data.view(), 5)?;
    let pca = model.projector();

    let ratio = pca.explained_variance_ratio().unwrap();
    assert_abs_diff_eq!(
        ratio,
        Array1::from(vec![0.44272, 0.189712, 0.093932, 0.066021, 0.054958]),
        epsilon = 1e-4
    );
    let ev = pca.explained_variance().unwrap();
    assert_abs_diff_eq!(ev[0], 13.304991, epsilon = 1e-4);
    assert_abs_diff_eq!(ev[1], 5.701375, epsilon = 1e-4);

    // standardized columns have population variance 1, so the sample
    // covariance trace is n_features * n / (n - 1)
    let expected_total = N_FEATURES as f64 * N_SAMPLES as f64 / (N_SAMPLES - 1) as f64;
    assert_abs_diff_eq!(pca.total_variance().unwrap(), expected_total, epsilon = 1e-9);
    Ok(())
}

#[test]
fn test_standardized_columns_on_dataset() -> Result<(), Box<dyn Error>> {
    let data = load_breast_cancer()?;
    let mut scaler = Standardizer::new();
    let z = scaler.fit_transform(data.view())?;

    let means = z.mean_axis(Axis(0)).unwrap();
    let stds = z.std_axis(Axis(0), 0.0);
    assert_abs_diff_eq!(means, Array1::<f64>::zeros(N_FEATURES), epsilon = 1e-9);
    assert_abs_diff_eq!(stds, Array1::<f64>::ones(N_FEATURES), epsilon = 1e-9);
    assert_eq!(scaler.n_samples_seen(), Some(N_SAMPLES));
    Ok(())
}

#[test]
fn test_sample_variance_rescales_scores() -> Result<(), Box<dyn Error>> {
    let data = load_breast_cancer()?;
    let config = StandardizerConfig {
        variance: VarianceConvention::Sample,
        ..StandardizerConfig::default()
    };
    let mut model = StandardizedPca::with_config(config, SvdSolver::Exact);
    let scores = model.fit_transform(data.view(), 2)?;

    // z-scores shrink by sqrt((n - 1) / n) when dividing by n - 1
    let shrink = ((N_SAMPLES - 1) as f64 / N_SAMPLES as f64).sqrt();
    assert_abs_diff_eq!(scores[[0, 0]], 9.192837 * shrink, epsilon = 1e-3);
    assert_abs_diff_eq!(scores[[0, 1]], 1.948583 * shrink, epsilon = 1e-3);
    Ok(())
}

#[test]
fn test_randomized_solver_on_dataset() -> Result<(), Box<dyn Error>> {
    let data = load_breast_cancer()?;
    let solver = SvdSolver::Randomized {
        n_oversamples: 10,
        n_power_iterations: 4,
        seed: 2024,
    };
    let mut model = StandardizedPca::with_config(StandardizerConfig::default(), solver);
    let scores = model.fit_transform(data.view(), 2)?;

    assert_abs_diff_eq!(scores[[0, 0]], 9.192837, epsilon = 1e-3);
    assert_abs_diff_eq!(scores[[0, 1]], 1.948583, epsilon = 1e-3);
    Ok(())
}

#[test]
fn test_transform_rejects_29_features() -> Result<(), Box<dyn Error>> {
    let data = load_breast_cancer()?;
    let mut model = StandardizedPca::new();
    model.fit(data.view(), 2)?;

    let narrow = data.slice(s![.., ..29]);
    assert!(matches!(
        model.transform(narrow),
        Err(PcaError::DimensionMismatch { expected: 30, found: 29 })
    ));
    Ok(())
}

#[test]
fn test_inverse_transform_all_components_recovers_data() -> Result<(), Box<dyn Error>> {
    let data = load_breast_cancer()?;
    let mut model = StandardizedPca::new();
    let scores = model.fit_transform(data.view(), N_FEATURES)?;
    let reconstructed = model.inverse_transform(scores.view())?;
    for (r, d) in reconstructed.iter().zip(data.iter()) {
        assert_abs_diff_eq!(r, d, epsilon = 1e-8 * d.abs().max(1.0));
    }
    Ok(())
}

#[test]
fn test_fitted_model_serde_round_trip() -> Result<(), Box<dyn Error>> {
    let data = load_breast_cancer()?;
    let mut model = StandardizedPca::new();
    let scores = model.fit_transform(data.view(), 2)?;

    let json = serde_json::to_string(&model)?;
    let restored: StandardizedPca = serde_json::from_str(&json)?;
    assert!(restored.is_fitted());
    assert_abs_diff_eq!(restored.transform(data.view())?, scores, epsilon = 1e-10);
    Ok(())
}

#[test]
fn test_refit_failure_keeps_pipeline_state() -> Result<(), Box<dyn Error>> {
    let data = load_breast_cancer()?;
    let mut model = StandardizedPca::new();
    let scores = model.fit_transform(data.view(), 2)?;

    assert!(matches!(
        model.fit(data.view(), 31),
        Err(PcaError::InvalidComponentCount { requested: 31, max: 30 })
    ));
    assert_eq!(model.transform(data.view())?, scores);
    Ok(())
}
