use std::path::Path;

use anyhow::{Context, Result};

/// Pipeline stage a shader entry point runs in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Entry point name used when none is given explicitly.
    pub fn default_entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "[VERTEX]",
            ShaderStage::Fragment => "[FRAGMENT]",
        }
    }
}

/// Compiled WGSL module.
///
/// One module may hold both the vertex and fragment entry points; attach it
/// to a program once per stage.
#[derive(Debug, Clone)]
pub struct Shader {
    label: String,
    module: wgpu::ShaderModule,
}

impl Shader {
    /// Compiles WGSL source. Compiler diagnostics are logged; a module that
    /// fails to compile is returned as an error.
    pub fn from_wgsl(device: &wgpu::Device, label: &str, source: &str) -> Result<Self> {
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let info = pollster::block_on(module.get_compilation_info());
        for msg in &info.messages {
            let at = msg
                .location
                .map(|l| format!("{}:{}", l.line_number, l.line_position))
                .unwrap_or_default();
            match msg.message_type {
                wgpu::CompilationMessageType::Error => {
                    log::error!("shader {label} {at}: could not compile: {}", msg.message)
                }
                wgpu::CompilationMessageType::Warning => {
                    log::warn!("shader {label} {at}: {}", msg.message)
                }
                wgpu::CompilationMessageType::Info => {
                    log::debug!("shader {label} {at}: {}", msg.message)
                }
            }
        }

        if let Some(err) = pollster::block_on(scope.pop()) {
            if info.messages.is_empty() {
                log::error!("shader {label}: could not compile: {err}");
            }
            anyhow::bail!("shader {label} failed to compile");
        }

        Ok(Self {
            label: label.to_string(),
            module,
        })
    }

    /// Reads and compiles a WGSL file. The file name becomes the label.
    pub fn load_from_file(device: &wgpu::Device, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read shader {}", path.display()))?;

        Self::from_wgsl(device, &path.display().to_string(), &source)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    pub(super) fn describe(&self, stage: ShaderStage) -> String {
        format!("{} {}", stage.tag(), self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_device() -> (wgpu::Device, wgpu::Queue) {
        wgpu::Device::noop(&wgpu::DeviceDescriptor::default())
    }

    #[test]
    fn valid_source_compiles() {
        let (device, _queue) = test_device();
        let shader = Shader::from_wgsl(
            &device,
            "ok",
            "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }",
        )
        .unwrap();
        assert_eq!(shader.label(), "ok");
    }

    #[test]
    fn syntax_errors_are_returned() {
        let (device, _queue) = test_device();
        let err = Shader::from_wgsl(&device, "broken", "fn vs_main( -> {").unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let (device, _queue) = test_device();
        let err = Shader::load_from_file(&device, "no/such/shader.wgsl").unwrap_err();
        assert!(err.to_string().contains("no/such/shader.wgsl"));
    }

    #[test]
    fn default_entry_points() {
        assert_eq!(ShaderStage::Vertex.default_entry_point(), "vs_main");
        assert_eq!(ShaderStage::Fragment.default_entry_point(), "fs_main");
    }
}
