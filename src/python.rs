//! Python bindings for the tokenizer.
//!
//! Log records are forwarded to Python's `logging` module through `pyo3-log`.

use pyo3::{exceptions::PyValueError, prelude::*};

use crate::{
    error::{BpeError, ErrorMode},
    tokenizer::Tokenizer,
    types::Token,
};

fn to_py_err(err: BpeError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Python wrapper for the byte-level BPE tokenizer.
#[pyclass(name = "BPETokenizer")]
pub struct PyBpeTokenizer {
    inner: Tokenizer,
}

#[pymethods]
impl PyBpeTokenizer {
    #[new]
    fn new(max_vocab_size: usize) -> PyResult<Self> {
        let inner = Tokenizer::new(max_vocab_size).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn register_special_token(&mut self, token: &str) -> PyResult<Token> {
        self.inner.register_special_token(token).map_err(to_py_err)
    }

    /// Returns the number of merges learned by this call.
    #[pyo3(signature = (text, stop_early = false))]
    fn train(&mut self, py: Python<'_>, text: &str, stop_early: bool) -> usize {
        let summary = py.allow_threads(|| self.inner.train(text, stop_early));
        summary.merges
    }

    fn encode(&self, text: &str) -> Vec<Token> {
        self.inner.encode(text)
    }

    #[pyo3(signature = (ids, errors = "strict"))]
    fn decode(&self, ids: Vec<Token>, errors: &str) -> PyResult<String> {
        let mode: ErrorMode = errors.parse().map_err(PyValueError::new_err)?;
        self.inner.decode_with(&ids, mode).map_err(to_py_err)
    }

    #[getter]
    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    #[getter]
    fn max_vocab_size(&self) -> usize {
        self.inner.max_vocab_size()
    }

    fn merges(&self) -> Vec<((Token, Token), Token)> {
        self.inner
            .merges()
            .map(|(pair, token)| ((pair.0, pair.1), token))
            .collect()
    }

    fn special_tokens(&self) -> Vec<(String, Token)> {
        self.inner
            .special_tokens()
            .into_iter()
            .map(|(literal, token)| (literal.to_owned(), token))
            .collect()
    }
}

#[pymodule]
fn bytebpe(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();
    m.add_class::<PyBpeTokenizer>()?;
    Ok(())
}
