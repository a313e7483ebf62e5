//! Built-in textured-quad shaders and the front-end checks the software
//! backend runs in place of a driver compiler.

use crate::{GraphicsError, ShaderStage};

pub const QUAD_VERTEX_SHADER: &str = r#"#version 300 es
in vec2 a_position;
in vec2 a_texcoord;
uniform mat3 u_transform;
out vec2 v_texcoord;

void main() {
    vec3 p = u_transform * vec3(a_position, 1.0);
    gl_Position = vec4(p.xy, 0.0, 1.0);
    v_texcoord = a_texcoord;
}
"#;

pub const QUAD_FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
in vec2 v_texcoord;
uniform sampler2D u_texture;
uniform float u_opacity;
out vec4 out_color;

void main() {
    vec4 color = texture(u_texture, v_texcoord);
    out_color = vec4(color.rgb, color.a * u_opacity);
}
"#;

/// Stage inputs and outputs declared by a shader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderInterface {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

pub fn compile(stage: ShaderStage, source: &str) -> Result<ShaderInterface, GraphicsError> {
    let fail = |log: &str| GraphicsError::ShaderCompile {
        stage,
        log: log.to_string(),
    };

    if source.trim().is_empty() {
        return Err(fail("empty source"));
    }
    if !has_main(source) {
        return Err(fail("missing `void main()` entry point"));
    }
    check_balanced(source).map_err(|log| fail(&log))?;

    let mut interface = ShaderInterface::default();
    for line in source.lines() {
        let line = strip_layout(line.trim());
        let mut words = line.split_whitespace();
        let qualifier = words.next();
        let (Some(_ty), Some(name)) = (words.next(), words.next()) else {
            continue;
        };
        let name = name.trim_end_matches(';').to_string();
        match (qualifier, stage) {
            (Some("in") | Some("attribute"), _) => interface.inputs.push(name),
            (Some("varying"), ShaderStage::Vertex) => interface.outputs.push(name),
            (Some("varying"), ShaderStage::Fragment) => interface.inputs.push(name),
            (Some("out"), _) => interface.outputs.push(name),
            _ => {}
        }
    }
    Ok(interface)
}

/// Every fragment input has to be written by the vertex stage.
pub fn link(vertex: &ShaderInterface, fragment: &ShaderInterface) -> Result<(), GraphicsError> {
    let missing: Vec<&str> = fragment
        .inputs
        .iter()
        .filter(|input| !vertex.outputs.contains(input))
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(GraphicsError::ProgramLink(format!(
            "fragment inputs not written by vertex stage: {}",
            missing.join(", ")
        )))
    }
}

fn has_main(source: &str) -> bool {
    source.match_indices("void").any(|(i, _)| {
        let rest = source[i + 4..].trim_start();
        rest.strip_prefix("main")
            .is_some_and(|r| r.trim_start().starts_with('('))
    })
}

fn check_balanced(source: &str) -> Result<(), String> {
    let mut stack = Vec::new();
    for (line_no, line) in source.lines().enumerate() {
        let code = line.split("//").next().unwrap_or("");
        for ch in code.chars() {
            match ch {
                '{' | '(' => stack.push(ch),
                '}' | ')' => {
                    let open = if ch == '}' { '{' } else { '(' };
                    if stack.pop() != Some(open) {
                        return Err(format!("{}: unexpected `{ch}`", line_no + 1));
                    }
                }
                _ => {}
            }
        }
    }
    match stack.last() {
        Some(open) => Err(format!("unclosed `{open}` at end of source")),
        None => Ok(()),
    }
}

fn strip_layout(line: &str) -> &str {
    match line.strip_prefix("layout") {
        Some(rest) => rest.split_once(')').map_or(rest, |(_, tail)| tail.trim_start()),
        None => line,
    }
}
