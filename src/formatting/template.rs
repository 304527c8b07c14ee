use std::time::Duration;

use super::RenderContext;
use super::formatter::{Formatter, default_format, new_formatter};
use super::value::Values;
use crate::error::{CompileError, RenderError};

/// A compiled template: alternatives separated by `|`, tried in order.
#[derive(Debug)]
pub struct FormatTemplate {
    alternatives: Vec<Vec<Token>>,
}

#[derive(Debug)]
enum Token {
    Text(String),
    Group(FormatTemplate),
    Placeholder {
        name: String,
        formatter: Option<Box<dyn Formatter>>,
    },
}

impl FormatTemplate {
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        let mut parser = Parser {
            chars: source.chars().collect(),
            pos: 0,
        };
        parser.template(false)
    }

    pub fn render(&self, values: &Values) -> Result<String, RenderError> {
        self.render_with(values, &RenderContext::default())
    }

    /// The first alternative that renders wins; the last failure is reported.
    pub fn render_with(&self, values: &Values, ctx: &RenderContext) -> Result<String, RenderError> {
        let mut last_err = None;
        for tokens in &self.alternatives {
            match render_tokens(tokens, values, ctx) {
                Ok(text) => return Ok(text),
                Err(err) => last_err = Some(err),
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => Ok(String::new()),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.alternatives.iter().flatten().any(|token| match token {
            Token::Placeholder { name, .. } => name == key,
            Token::Group(group) => group.contains_key(key),
            Token::Text(_) => false,
        })
    }

    /// Smallest refresh interval requested by a time-dependent formatter.
    pub fn interval(&self) -> Option<Duration> {
        self.alternatives
            .iter()
            .flatten()
            .filter_map(|token| match token {
                Token::Placeholder {
                    formatter: Some(formatter),
                    ..
                } => formatter.interval(),
                Token::Group(group) => group.interval(),
                _ => None,
            })
            .min()
    }
}

fn render_tokens(
    tokens: &[Token],
    values: &Values,
    ctx: &RenderContext,
) -> Result<String, RenderError> {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Group(group) => out.push_str(&group.render_with(values, ctx)?),
            Token::Placeholder { name, formatter } => {
                let value = values
                    .get(name)
                    .ok_or_else(|| RenderError::MissingKey(name.clone()))?;
                let text = match formatter {
                    Some(formatter) => formatter.format(value, ctx)?,
                    None => default_format(value, ctx)?,
                };
                out.push_str(&text);
            }
        }
    }
    Ok(out)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn template(&mut self, nested: bool) -> Result<FormatTemplate, CompileError> {
        let mut alternatives = Vec::new();
        let mut current = Vec::new();
        loop {
            match self.peek() {
                None if nested => return Err(CompileError::syntax(self.pos, "missing `}`")),
                None => break,
                Some('}') if nested => {
                    self.pos += 1;
                    break;
                }
                Some('}') => return Err(CompileError::syntax(self.pos, "unexpected `}`")),
                Some('{') => {
                    self.pos += 1;
                    current.push(Token::Group(self.template(true)?));
                }
                Some('|') => {
                    self.pos += 1;
                    alternatives.push(std::mem::take(&mut current));
                }
                Some('$') => {
                    self.pos += 1;
                    current.push(self.placeholder()?);
                }
                Some(_) => current.push(Token::Text(self.text())),
            }
        }
        alternatives.push(current);
        Ok(FormatTemplate { alternatives })
    }

    fn text(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            match c {
                '{' | '}' | '|' | '$' => break,
                '\\' => {
                    self.pos += 1;
                    if let Some(escaped) = self.peek() {
                        out.push(escaped);
                        self.pos += 1;
                    }
                }
                other => {
                    out.push(other);
                    self.pos += 1;
                }
            }
        }
        out
    }

    fn placeholder(&mut self) -> Result<Token, CompileError> {
        let start = self.pos;
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if name.is_empty() {
            return Err(CompileError::syntax(start, "expected a placeholder name after `$`"));
        }

        let formatter = if self.formatter_follows() {
            self.pos += 1;
            let formatter_name = self.take_while(|c| c.is_ascii_lowercase() || c == '-');
            self.pos += 1;
            let args = self.args()?;
            Some(new_formatter(&formatter_name, &args)?)
        } else {
            None
        };

        Ok(Token::Placeholder { name, formatter })
    }

    /// `.name(` ahead; a lone `.` stays literal text.
    fn formatter_follows(&self) -> bool {
        if self.peek() != Some('.') {
            return false;
        }
        let mut i = self.pos + 1;
        while matches!(self.chars.get(i), Some(c) if c.is_ascii_lowercase() || *c == '-') {
            i += 1;
        }
        i > self.pos + 1 && self.chars.get(i) == Some(&'(')
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !accept(c) {
                break;
            }
            out.push(c);
            self.pos += 1;
        }
        out
    }

    fn args(&mut self) -> Result<Vec<String>, CompileError> {
        let start = self.pos;
        let mut args = Vec::new();
        let mut current = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            match c {
                '\\' => {
                    if let Some(escaped) = self.peek() {
                        current.push(escaped);
                        self.pos += 1;
                    }
                }
                ',' => args.push(std::mem::take(&mut current)),
                ')' => {
                    if !current.is_empty() || !args.is_empty() {
                        args.push(current);
                    }
                    return Ok(args);
                }
                other => current.push(other),
            }
        }
        Err(CompileError::syntax(start, "missing `)`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatting::Value;

    fn values(pairs: &[(&str, Value)]) -> Values {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn literal_and_placeholder() {
        let t = FormatTemplate::compile("load $avg").unwrap();
        let v = values(&[("avg", Value::text("0.42"))]);
        assert_eq!(t.render(&v).unwrap(), "load 0.42");
    }

    #[test]
    fn missing_key_is_an_error() {
        let t = FormatTemplate::compile("$gone").unwrap();
        assert_eq!(
            t.render(&Values::new()),
            Err(RenderError::MissingKey("gone".to_string()))
        );
    }

    #[test]
    fn alternatives_fall_through_on_render_errors() {
        let t = FormatTemplate::compile("$a|$b|none").unwrap();
        assert_eq!(t.render(&values(&[("b", Value::text("B"))])).unwrap(), "B");
        assert_eq!(t.render(&Values::new()).unwrap(), "none");
    }

    #[test]
    fn last_alternative_error_is_reported() {
        let t = FormatTemplate::compile("$a|$b").unwrap();
        assert_eq!(
            t.render(&Values::new()),
            Err(RenderError::MissingKey("b".to_string()))
        );
    }

    #[test]
    fn flag_groups_render_conditionally() {
        let t = FormatTemplate::compile("vol{$muted muted|}").unwrap();
        assert_eq!(t.render(&values(&[("muted", Value::flag())])).unwrap(), "vol muted");
        assert_eq!(t.render(&Values::new()).unwrap(), "vol");
    }

    #[test]
    fn escapes_and_lone_dots_are_text() {
        let t = FormatTemplate::compile("\\$5 $x. \\{ok\\}").unwrap();
        let v = values(&[("x", Value::text("end"))]);
        assert_eq!(t.render(&v).unwrap(), "$5 end. {ok}");
    }

    #[test]
    fn formatter_arguments_may_escape_commas() {
        let t = FormatTemplate::compile("$t.datetime(%H\\,%M)").unwrap();
        assert!(t.contains_key("t"));
    }

    #[test]
    fn default_number_formatting() {
        let t = FormatTemplate::compile("$size").unwrap();
        assert_eq!(t.render(&values(&[("size", Value::bytes(1536))])).unwrap(), "1.50 KiB");
        assert_eq!(t.render(&values(&[("size", Value::bytes(999))])).unwrap(), "999 B");
    }

    #[test]
    fn rendering_is_deterministic() {
        let t = FormatTemplate::compile("{$a.eng(3)|-} / $b.str(4) $c.bar(3)").unwrap();
        let v = values(&[
            ("a", Value::percents(12.5)),
            ("b", Value::text("xy")),
            ("c", Value::number(40)),
        ]);
        let first = t.render(&v).unwrap();
        for _ in 0..16 {
            assert_eq!(t.render(&v).unwrap(), first);
        }
    }

    #[test]
    fn syntax_errors_carry_positions() {
        assert_eq!(
            FormatTemplate::compile("ab}").unwrap_err(),
            CompileError::syntax(2, "unexpected `}`")
        );
        assert!(matches!(
            FormatTemplate::compile("{open").unwrap_err(),
            CompileError::Syntax { .. }
        ));
        assert!(matches!(
            FormatTemplate::compile("$x.str(3").unwrap_err(),
            CompileError::Syntax { .. }
        ));
        assert!(matches!(
            FormatTemplate::compile("$ alone").unwrap_err(),
            CompileError::Syntax { position: 1, .. }
        ));
    }

    #[test]
    fn interval_comes_from_nested_rot_str() {
        let t = FormatTemplate::compile("{$title.rot-str(10,0.5)|x}").unwrap();
        assert_eq!(t.interval(), Some(Duration::from_millis(500)));
        assert_eq!(FormatTemplate::compile("$a").unwrap().interval(), None);
    }
}
