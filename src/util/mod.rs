//! Utility functions and macros

use std::collections::HashMap;

/// Collection of utility macros for Vistle development
pub mod macros {
    /// Helper macro for implementing common module patterns
    #[macro_export]
    macro_rules! vistle_module_base {
        ($name:ident) => {
            impl $name {
                pub fn base_setup(&mut self) {
                    // Common setup logic
                }
            }
        };
    }

    /// Macro for creating parameter builders
    #[macro_export]
    macro_rules! param_builder {
        ($($param:ident: $type:ty),*) => {
            pub struct ParamBuilder {
                $(pub $param: Option<$type>),*
            }

            impl ParamBuilder {
                pub fn new() -> Self {
                    Self {
                        $($param: None),*
                    }
                }

                $(
                    pub fn $param(mut self, value: $type) -> Self {
                        self.$param = Some(value);
                        self
                    }
                )*

                pub fn build(self) -> Result<($($type),*), String> {
                    Ok((
                        $(self.$param.ok_or_else(|| format!("Missing parameter: {}", stringify!($param)))?),*
                    ))
                }
            }
        };
    }

    /// Macro for timing code execution
    #[macro_export]
    macro_rules! time_execution {
        ($name:expr, $code:block) => {{
            let start = std::time::Instant::now();
            let result = $code;
            let duration = start.elapsed();
            tracing::info!("{} completed in {:?}", $name, duration);
            result
        }};
    }
}

/// Performance monitoring utilities
pub struct PerformanceMonitor {
    timings: HashMap<String, Vec<std::time::Duration>>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
        }
    }

    pub fn start_timer(&self, name: &str) -> Timer {
        Timer::new(name.to_string())
    }

    pub fn record_timing(&mut self, name: String, duration: std::time::Duration) {
        self.timings.entry(name).or_insert_with(Vec::new).push(duration);
    }

    pub fn get_average(&self, name: &str) -> Option<std::time::Duration> {
        self.timings.get(name).and_then(|durations| {
            if durations.is_empty() {
                None
            } else {
                let total: std::time::Duration = durations.iter().sum();
                Some(total / durations.len() as u32)
            }
        })
    }

    pub fn get_stats(&self, name: &str) -> Option<TimingStats> {
        self.timings.get(name).map(|durations| {
            if durations.is_empty() {
                return TimingStats {
                    count: 0,
                    average: std::time::Duration::ZERO,
                    min: std::time::Duration::ZERO,
                    max: std::time::Duration::ZERO,
                };
            }

            let count = durations.len();
            let total: std::time::Duration = durations.iter().sum();
            let average = total / count as u32;
            let min = durations.iter().min().unwrap().clone();
            let max = durations.iter().max().unwrap().clone();

            TimingStats { count, average, min, max }
        })
    }

    pub fn clear(&mut self) {
        self.timings.clear();
    }
}

pub struct Timer {
    name: String,
    start: std::time::Instant,
}

impl Timer {
    pub fn new(name: String) -> Self {
        Self {
            name,
            start: std::time::Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.elapsed();
        tracing::debug!("Timer '{}' finished in {:?}", self.name, duration);
    }
}

#[derive(Debug, Clone)]
pub struct TimingStats {
    pub count: usize,
    pub average: std::time::Duration,
    pub min: std::time::Duration,
    pub max: std::time::Duration,
}

/// File I/O utilities
pub mod io {
    use std::path::Path;
    use tokio::fs;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Read binary data from file
    pub async fn read_binary<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, crate::Error> {
        let mut file = fs::File::open(path).await?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).await?;
        Ok(buffer)
    }

    /// Write binary data to file
    pub async fn write_binary<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), crate::Error> {
        let mut file = fs::File::create(path).await?;
        file.write_all(data).await?;
        Ok(())
    }

    /// Read text from file
    pub async fn read_text<P: AsRef<Path>>(path: P) -> Result<String, crate::Error> {
        let content = fs::read_to_string(path).await?;
        Ok(content)
    }

    /// Write text to file
    pub async fn write_text<P: AsRef<Path>>(path: P, text: &str) -> Result<(), crate::Error> {
        fs::write(path, text).await?;
        Ok(())
    }
}
