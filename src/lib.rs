//! K-nearest-neighbor classification over labeled 2D points, with a
//! median-split k-d tree backend for bounded neighbor search.
//!
//! The crate builds as an ordinary Rust library by default; enabling the
//! `python` feature additionally compiles a Python extension module exposing
//! the classifier to the surrounding data-loading and plotting scripts.

pub mod common_types;
pub mod knn;

#[cfg(feature = "python")]
mod python {
    use pyo3::exceptions::{PyTypeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::{PyDict, PyList};

    use crate::common_types::{self, LabeledPoint, Point2};
    use crate::knn::{KnnClassifier, PredictionError, SearchStrategy as RustSearchStrategy};

    /// Manhattan distance between two 2D points.
    #[pyfunction]
    fn manhattan_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
        common_types::manhattan_distance(Point2::new(a.0, a.1), Point2::new(b.0, b.1))
    }

    /// Python-friendly representation of SearchStrategy
    #[pyclass(name = "SearchStrategy")]
    #[derive(Clone, Debug)]
    enum PySearchStrategy {
        BruteForce,
        KdTree,
    }

    impl From<PySearchStrategy> for RustSearchStrategy {
        fn from(val: PySearchStrategy) -> Self {
            match val {
                PySearchStrategy::BruteForce => RustSearchStrategy::BruteForce,
                PySearchStrategy::KdTree => RustSearchStrategy::KdTree,
            }
        }
    }

    impl From<RustSearchStrategy> for PySearchStrategy {
        fn from(val: RustSearchStrategy) -> Self {
            match val {
                RustSearchStrategy::BruteForce => PySearchStrategy::BruteForce,
                RustSearchStrategy::KdTree => PySearchStrategy::KdTree,
            }
        }
    }

    fn prediction_error_to_py(err: PredictionError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }

    fn labeled_point_from_features(features: &[f64], label: String) -> PyResult<LabeledPoint<f64, String>> {
        match features {
            [x, y] => Ok(LabeledPoint::new(Point2::new(*x, *y), label)),
            _ => Err(PyValueError::new_err(
                "'features' must contain exactly two coordinates",
            )),
        }
    }

    #[pyclass(name = "KnnClassifier")]
    struct PyKnnClassifier {
        classifier: KnnClassifier<f64, String>,
        search_strategy_override: Option<RustSearchStrategy>, // The user's choice from Python
    }

    #[pymethods]
    impl PyKnnClassifier {
        #[new]
        #[pyo3(signature = (k, search_strategy_override = None))]
        fn new(k: usize, search_strategy_override: Option<PySearchStrategy>) -> Self {
            PyKnnClassifier {
                classifier: KnnClassifier::new(k),
                search_strategy_override: search_strategy_override.map(|s| s.into()),
            }
        }

        /// Trains the classifier. Items are either dictionaries like
        /// `{'features': (x, y), 'label': 'A'}` or tuples like `((x, y), 'A')`.
        fn fit(&mut self, training_data_py: &Bound<'_, PyList>) -> PyResult<()> {
            let mut training_data: Vec<LabeledPoint<f64, String>> = Vec::new();

            for item_py in training_data_py {
                if let Ok(dict) = item_py.downcast::<PyDict>() {
                    let features_any = dict
                        .get_item("features")?
                        .ok_or_else(|| PyValueError::new_err("Missing 'features' key"))?;
                    let features: Vec<f64> = features_any.extract()?;
                    let label_any = dict
                        .get_item("label")?
                        .ok_or_else(|| PyValueError::new_err("Missing 'label' key"))?;
                    let label: String = label_any.extract()?;
                    training_data.push(labeled_point_from_features(&features, label)?);
                } else if let Ok((features, label)) = item_py.extract::<(Vec<f64>, String)>() {
                    training_data.push(labeled_point_from_features(&features, label)?);
                } else {
                    return Err(PyTypeError::new_err(
                        "Training data items must be dictionaries {'features': (x, y), 'label': '...'} or tuples ((x, y), '...')",
                    ));
                }
            }

            self.classifier.fit(training_data, self.search_strategy_override);
            Ok(())
        }

        fn predict_single(&self, query: (f64, f64)) -> PyResult<String> {
            self.classifier
                .predict_single(Point2::new(query.0, query.1))
                .map_err(prediction_error_to_py)
        }

        fn predict(&self, queries: Vec<(f64, f64)>) -> PyResult<Vec<String>> {
            let points: Vec<Point2<f64>> = queries
                .into_iter()
                .map(|(x, y)| Point2::new(x, y))
                .collect();
            self.classifier.predict(&points).map_err(prediction_error_to_py)
        }

        /// The k nearest training points as `((x, y), label, distance)`
        /// triples, nearest first.
        fn k_nearest(&self, query: (f64, f64)) -> Vec<((f64, f64), String, f64)> {
            self.classifier
                .nearest_neighbors(Point2::new(query.0, query.1))
                .into_iter()
                .map(|(distance, p)| ((p.point.x, p.point.y), p.label, distance))
                .collect()
        }

        #[getter]
        fn search_strategy(&self) -> PySearchStrategy {
            self.classifier.get_search_strategy().into()
        }
    }

    /// The Python module; its name must match the library name so the
    /// extension imports cleanly.
    #[pymodule]
    fn knn_classification(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(manhattan_distance, m)?)?;
        m.add_class::<PySearchStrategy>()?;
        m.add_class::<PyKnnClassifier>()?;
        Ok(())
    }
}
