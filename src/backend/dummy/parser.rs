//! Parser for the dummy backend's effect-file syntax.
//!
//! The accepted language is a small subset of the classic effect-file format:
//!
//! ```text
//! float4 tint < string source = "global.tint"; > = { 1, 1, 1, 1 };
//! texture2D scene < string texture = "scene_rt"; string format = "A8R8G8B8"; >;
//! sampler2D scene_sampler = sampler_state { Texture = <scene>; };
//!
//! technique main < int shader_model = 2; >
//! {
//!     pass p0 < string target0 = "scene_rt"; >
//!     {
//!         CullMode = 1;
//!         PixelShader = compile ps_2_0 ps_main();
//!     }
//! }
//! ```
//!
//! Shader bodies are not compiled; `VertexShader`/`PixelShader` assignments
//! only record that a stage is present.

use glam::Vec4;

use crate::backend::types::{AnnotationValue, NativeValue, ParameterDesc, ParameterKind};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedEffect {
    pub parameters: Vec<ParsedParameter>,
    pub techniques: Vec<ParsedTechnique>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedParameter {
    pub name: String,
    pub desc: ParameterDesc,
    pub annotations: Vec<(String, AnnotationValue)>,
    pub initial: NativeValue,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedTechnique {
    pub name: String,
    pub annotations: Vec<(String, AnnotationValue)>,
    pub passes: Vec<ParsedPass>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedPass {
    pub name: String,
    pub annotations: Vec<(String, AnnotationValue)>,
    pub states: Vec<(String, u32)>,
    pub vertex_shader: bool,
    pub pixel_shader: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Lexed {
    token: Token,
    line: usize,
}

/// Literal on the right-hand side of an initializer or annotation.
#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<f64>),
}

type ParseResult<T> = Result<T, String>;

/// Parse effect source, returning line-numbered diagnostics on failure.
pub(crate) fn parse_effect(source: &str) -> Result<ParsedEffect, Vec<String>> {
    let tokens = tokenize(source).map_err(|e| vec![e])?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_file().map_err(|e| vec![e])
}

fn tokenize(source: &str) -> ParseResult<Vec<Lexed>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = line;
                i += 2;
                loop {
                    if i + 1 >= chars.len() {
                        return Err(format!("line {start}: unterminated block comment"));
                    }
                    if chars[i] == '*' && chars[i + 1] == '/' {
                        i += 2;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
            }
            '"' => {
                let start = line;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None | Some('\n') => {
                            return Err(format!("line {start}: unterminated string literal"))
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            match chars.get(i + 1) {
                                Some('n') => text.push('\n'),
                                Some('t') => text.push('\t'),
                                Some(&other) => text.push(other),
                                None => {
                                    return Err(format!(
                                        "line {start}: unterminated string literal"
                                    ))
                                }
                            }
                            i += 2;
                        }
                        Some(&other) => {
                            text.push(other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Lexed {
                    token: Token::Str(text),
                    line,
                });
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '.')
                    && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit() || *n == '.')) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let n = chars[i];
                    let exponent_sign = (n == '-' || n == '+')
                        && matches!(chars.get(i - 1), Some('e') | Some('E'));
                    if n.is_ascii_digit() || n == '.' || n == 'e' || n == 'E' || exponent_sign {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                // Float suffix
                if matches!(chars.get(i), Some('f') | Some('F') | Some('h') | Some('H')) {
                    i += 1;
                }
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("line {line}: invalid number '{text}'"))?;
                tokens.push(Lexed {
                    token: Token::Number(value),
                    line,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Lexed {
                    token: Token::Ident(chars[start..i].iter().collect()),
                    line,
                });
            }
            '<' | '>' | '{' | '}' | ';' | '=' | ',' | '[' | ']' | '(' | ')' | ':' => {
                tokens.push(Lexed {
                    token: Token::Punct(c),
                    line,
                });
                i += 1;
            }
            other => return Err(format!("line {line}: unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Lexed>,
    pos: usize,
}

impl Parser {
    fn parse_file(&mut self) -> ParseResult<ParsedEffect> {
        let mut parameters: Vec<ParsedParameter> = Vec::new();
        let mut techniques: Vec<ParsedTechnique> = Vec::new();

        while !self.at_end() {
            let keyword = self.expect_ident()?;
            match keyword.as_str() {
                "technique" | "technique9" | "technique10" | "technique11" => {
                    let technique = self.parse_technique()?;
                    if techniques.iter().any(|t| t.name == technique.name) {
                        return Err(format!(
                            "line {}: duplicate technique '{}'",
                            self.line(),
                            technique.name
                        ));
                    }
                    techniques.push(technique);
                }
                "uniform" | "shared" | "static" | "const" | "extern" => continue,
                type_name => {
                    let parameter = self.parse_parameter(type_name)?;
                    if parameters.iter().any(|p| p.name == parameter.name) {
                        return Err(format!(
                            "line {}: duplicate parameter '{}'",
                            self.line(),
                            parameter.name
                        ));
                    }
                    parameters.push(parameter);
                }
            }
        }

        Ok(ParsedEffect {
            parameters,
            techniques,
        })
    }

    fn parse_parameter(&mut self, type_name: &str) -> ParseResult<ParsedParameter> {
        let line = self.line();
        let mut desc = parameter_type(type_name)
            .ok_or_else(|| format!("line {line}: unknown type '{type_name}'"))?;
        let name = self.expect_ident()?;

        if self.eat_punct('[') {
            let count = self.expect_number()?;
            if count < 1.0 {
                return Err(format!("line {}: array length must be positive", self.line()));
            }
            desc.elements = count as u32;
            self.expect_punct(']')?;
        }

        // Semantic
        if self.eat_punct(':') {
            self.expect_ident()?;
        }

        let annotations = self.parse_annotations()?;

        let mut initial = NativeValue::zeroed(desc.kind);
        if self.eat_punct('=') {
            if self.peek_ident() == Some("sampler_state") {
                self.pos += 1;
                self.skip_block()?;
            } else {
                let line = self.line();
                let literal = self.parse_literal()?;
                initial = literal_to_value(desc, literal)
                    .map_err(|e| format!("line {line}: '{name}': {e}"))?;
            }
        }
        self.expect_punct(';')?;

        Ok(ParsedParameter {
            name,
            desc,
            annotations,
            initial,
        })
    }

    fn parse_technique(&mut self) -> ParseResult<ParsedTechnique> {
        let name = self.expect_ident()?;
        let annotations = self.parse_annotations()?;
        self.expect_punct('{')?;

        let mut passes: Vec<ParsedPass> = Vec::new();
        while !self.eat_punct('}') {
            let keyword = self.expect_ident()?;
            if keyword != "pass" {
                return Err(format!(
                    "line {}: expected 'pass', found '{keyword}'",
                    self.line()
                ));
            }
            passes.push(self.parse_pass()?);
        }

        Ok(ParsedTechnique {
            name,
            annotations,
            passes,
        })
    }

    fn parse_pass(&mut self) -> ParseResult<ParsedPass> {
        let name = self.expect_ident()?;
        let annotations = self.parse_annotations()?;
        self.expect_punct('{')?;

        let mut pass = ParsedPass {
            name,
            annotations,
            states: Vec::new(),
            vertex_shader: false,
            pixel_shader: false,
        };

        while !self.eat_punct('}') {
            let state = self.expect_ident()?;
            if self.eat_punct('[') {
                self.expect_number()?;
                self.expect_punct(']')?;
            }
            self.expect_punct('=')?;

            match state.to_ascii_lowercase().as_str() {
                "vertexshader" | "pixelshader" => {
                    let present = self.peek_ident().is_some_and(|id| id != "NULL");
                    if state.eq_ignore_ascii_case("vertexshader") {
                        pass.vertex_shader = present;
                    } else {
                        pass.pixel_shader = present;
                    }
                    self.skip_until_semicolon()?;
                }
                _ => {
                    let value = self.parse_state_value()?;
                    self.expect_punct(';')?;
                    pass.states.push((state, value));
                }
            }
        }

        Ok(pass)
    }

    fn parse_state_value(&mut self) -> ParseResult<u32> {
        let line = self.line();
        match self.next() {
            Some(Token::Number(n)) => Ok(n as i64 as u32),
            Some(Token::Ident(id)) => Ok(match id.to_ascii_lowercase().as_str() {
                "true" => 1,
                "false" => 0,
                _ => state_name_value(&id),
            }),
            other => Err(format!("line {line}: invalid state value {other:?}")),
        }
    }

    fn parse_annotations(&mut self) -> ParseResult<Vec<(String, AnnotationValue)>> {
        let mut annotations = Vec::new();
        if !self.eat_punct('<') {
            return Ok(annotations);
        }

        while !self.eat_punct('>') {
            let line = self.line();
            let type_name = self.expect_ident()?;
            let name = self.expect_ident()?;
            self.expect_punct('=')?;
            let literal = self.parse_literal()?;
            self.expect_punct(';')?;

            let value = match (type_name.as_str(), literal) {
                ("bool", Literal::Bool(b)) => AnnotationValue::Bool(b),
                ("bool", Literal::Number(n)) => AnnotationValue::Bool(n != 0.0),
                ("int", Literal::Number(n)) => AnnotationValue::Int(n as i32),
                ("string", Literal::Str(s)) => AnnotationValue::String(s),
                (t, Literal::Number(n)) if t.starts_with("float") => {
                    AnnotationValue::Vector(vec![n as f32])
                }
                (t, Literal::List(v)) if t.starts_with("float") || t.starts_with("int") => {
                    AnnotationValue::Vector(v.into_iter().map(|x| x as f32).collect())
                }
                (t, literal) => {
                    return Err(format!(
                        "line {line}: annotation '{name}' of type {t} cannot hold {literal:?}"
                    ))
                }
            };
            annotations.push((name, value));
        }

        Ok(annotations)
    }

    fn parse_literal(&mut self) -> ParseResult<Literal> {
        let line = self.line();
        match self.next() {
            Some(Token::Number(n)) => Ok(Literal::Number(n)),
            Some(Token::Str(s)) => Ok(Literal::Str(s)),
            Some(Token::Ident(id)) if id == "true" => Ok(Literal::Bool(true)),
            Some(Token::Ident(id)) if id == "false" => Ok(Literal::Bool(false)),
            Some(Token::Ident(id)) if id.starts_with("float") || id.starts_with("int") => {
                // Constructor syntax: float4(1, 2, 3, 4)
                self.expect_punct('(')?;
                let values = self.parse_number_list(')')?;
                Ok(Literal::List(values))
            }
            Some(Token::Punct('{')) => Ok(Literal::List(self.parse_number_list('}')?)),
            other => Err(format!("line {line}: expected a value, found {other:?}")),
        }
    }

    fn parse_number_list(&mut self, close: char) -> ParseResult<Vec<f64>> {
        let mut values = Vec::new();
        if self.eat_punct(close) {
            return Ok(values);
        }
        loop {
            values.push(self.expect_number()?);
            if self.eat_punct(close) {
                return Ok(values);
            }
            self.expect_punct(',')?;
        }
    }

    fn skip_block(&mut self) -> ParseResult<()> {
        self.expect_punct('{')?;
        let mut depth = 1;
        while depth > 0 {
            match self.next() {
                Some(Token::Punct('{')) => depth += 1,
                Some(Token::Punct('}')) => depth -= 1,
                Some(_) => {}
                None => return Err("unexpected end of file inside block".to_string()),
            }
        }
        Ok(())
    }

    fn skip_until_semicolon(&mut self) -> ParseResult<()> {
        loop {
            match self.next() {
                Some(Token::Punct(';')) => return Ok(()),
                Some(_) => {}
                None => return Err("unexpected end of file, expected ';'".to_string()),
            }
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.tokens.get(self.pos).map(|t| &t.token) {
            Some(Token::Ident(id)) => Some(id),
            _ => None,
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if matches!(self.tokens.get(self.pos), Some(Lexed { token: Token::Punct(p), .. }) if *p == c)
        {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> ParseResult<()> {
        let line = self.line();
        match self.next() {
            Some(Token::Punct(p)) if p == c => Ok(()),
            Some(other) => Err(format!("line {line}: expected '{c}', found {other:?}")),
            None => Err(format!("line {line}: expected '{c}', found end of file")),
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        let line = self.line();
        match self.next() {
            Some(Token::Ident(id)) => Ok(id),
            Some(other) => Err(format!("line {line}: expected identifier, found {other:?}")),
            None => Err(format!("line {line}: expected identifier, found end of file")),
        }
    }

    fn expect_number(&mut self) -> ParseResult<f64> {
        let line = self.line();
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(other) => Err(format!("line {line}: expected number, found {other:?}")),
            None => Err(format!("line {line}: expected number, found end of file")),
        }
    }
}

fn parameter_type(type_name: &str) -> Option<ParameterDesc> {
    let lower = type_name.to_ascii_lowercase();
    let desc = match lower.as_str() {
        "bool" => ParameterDesc::bool(),
        "int" => ParameterDesc::int(),
        "string" => ParameterDesc::string(),
        "float" | "float1" => ParameterDesc::float(1),
        "float2" => ParameterDesc::float(2),
        "float3" => ParameterDesc::float(3),
        "float4" => ParameterDesc::float(4),
        t if t.starts_with("texture") || t.starts_with("sampler") => ParameterDesc::texture(),
        _ => return None,
    };
    Some(desc)
}

fn literal_to_value(desc: ParameterDesc, literal: Literal) -> Result<NativeValue, String> {
    match (desc.kind, literal) {
        (ParameterKind::Bool, Literal::Bool(b)) => Ok(NativeValue::Bool(b)),
        (ParameterKind::Bool, Literal::Number(n)) => Ok(NativeValue::Bool(n != 0.0)),
        (ParameterKind::Int, Literal::Number(n)) => Ok(NativeValue::Int(n as i32)),
        (ParameterKind::String, Literal::Str(s)) => Ok(NativeValue::String(s)),
        (ParameterKind::Float, Literal::Number(n)) => {
            Ok(NativeValue::Float(Vec4::new(n as f32, 0.0, 0.0, 0.0)))
        }
        (ParameterKind::Float, Literal::List(values)) => {
            if values.len() > desc.columns as usize {
                return Err(format!(
                    "{} initializer values for a {}-component float",
                    values.len(),
                    desc.columns
                ));
            }
            let mut components = [0.0f32; 4];
            for (slot, value) in components.iter_mut().zip(values) {
                *slot = value as f32;
            }
            Ok(NativeValue::Float(Vec4::from_array(components)))
        }
        (kind, literal) => Err(format!(
            "cannot initialize a {} with {literal:?}",
            kind.name()
        )),
    }
}

/// Stable numeric value for symbolic state values such as `CullMode = CCW`.
fn state_name_value(name: &str) -> u32 {
    name.to_ascii_uppercase()
        .bytes()
        .fold(2166136261u32, |hash, b| (hash ^ b as u32).wrapping_mul(16777619))
}
