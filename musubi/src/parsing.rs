//! GLSL scanning helpers.
//!
//! None of this is a GLSL parser: functions are only recognized by their signature line, and
//! `$placeholders` are located without looking at the surrounding code.

use std::borrow::Cow;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1, take_while};
use nom::character::complete::{char, multispace0, multispace1, satisfy};
use nom::combinator::{map, map_opt, opt, recognize, value, verify};
use nom::multi::{separated_list0, separated_list1};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated, tuple};
use nom::IResult;

use crate::errors::*;
use crate::types::{self, Qualifier, Value};

/// A function argument
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Arg {
    pub ty: String,
    pub name: String,
}

impl Arg {
    pub fn new(ty: &str, name: &str) -> Self {
        Arg {
            ty: ty.to_string(),
            name: name.to_string(),
        }
    }
}

/// Signature of a function definition
///
/// `anonymous` is set when the function name was written as a `$placeholder`, in which case
/// `name` holds the placeholder without its sigil.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature {
    pub name: String,
    pub anonymous: bool,
    pub args: Vec<Arg>,
    pub rtype: String,
}

impl Signature {
    /// Argument types and return type, as `vec4(vec4, float)`
    pub fn shape(&self) -> String {
        let args: Vec<_> = self.args.iter().map(|arg| arg.ty.as_str()).collect();
        format!("{}({})", self.rtype, args.join(", "))
    }
}

/// A function prototype (`vec4 transform(vec4);`)
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub arg_types: Vec<String>,
    pub rtype: String,
}

impl Prototype {
    pub fn shape(&self) -> String {
        format!("{}({})", self.rtype, self.arg_types.join(", "))
    }
}

/// A program variable declared statically in some code
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProgramVariable {
    pub name: String,
    pub qualifier: Option<Qualifier>,
    pub dtype: String,
}

/// A full variable declaration, as accepted by `Variable::declare`
#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub qualifier: Qualifier,
    pub dtype: String,
    pub name: String,
    pub value: Option<Value>,
}

/// A run of a parsed template
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Piece {
    Text(String),
    Placeholder(String),
}

/// Code split once into literal runs and `$name` references
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Template {
    pieces: Vec<Piece>,
}

impl Template {
    /// Recognizes `$name`, `${name}` and the `$$` escape; any other `$` is kept verbatim
    pub fn parse(code: &str) -> Self {
        let mut pieces: Vec<Piece> = Vec::new();
        let mut input = code;

        while !input.is_empty() {
            let (rest, piece) = match template_piece(input) {
                Ok(res) => res,
                Err(_) => (&input[input.len()..], Piece::Text(input.to_string())),
            };

            match (pieces.last_mut(), piece) {
                (Some(Piece::Text(ref mut text)), Piece::Text(more)) => text.push_str(&more),
                (_, piece) => pieces.push(piece),
            }

            input = rest;
        }

        Template { pieces }
    }

    #[inline]
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Distinct placeholder names, in order of first appearance
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for piece in &self.pieces {
            if let Piece::Placeholder(ref name) = *piece {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Replace every placeholder with what `resolve` returns for it
    ///
    /// All placeholders are resolved before any text is assembled.
    pub fn substitute<'a, F>(&'a self, mut resolve: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<Cow<'a, str>>,
    {
        let resolved: Vec<Cow<str>> = self
            .pieces
            .iter()
            .map(|piece| match *piece {
                Piece::Text(ref text) => Ok(Cow::Borrowed(text.as_str())),
                Piece::Placeholder(ref name) => resolve(name),
            })
            .collect::<Result<_>>()?;

        Ok(resolved.concat())
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn type_name(input: &str) -> IResult<&str, &str> {
    verify(identifier, |name: &str| types::is_type_name(name))(input)
}

fn qualifier(input: &str) -> IResult<&str, Qualifier> {
    map_opt(identifier, Qualifier::from_keyword)(input)
}

/// `$name` or `${name}`
fn placeholder(input: &str) -> IResult<&str, &str> {
    preceded(
        char('$'),
        alt((delimited(char('{'), identifier, char('}')), identifier)),
    )(input)
}

fn template_piece(input: &str) -> IResult<&str, Piece> {
    alt((
        value(Piece::Text(String::from("$")), tag("$$")),
        map(placeholder, |name| Piece::Placeholder(name.to_string())),
        map(take_till1(|c| c == '$'), |text: &str| Piece::Text(text.to_string())),
        value(Piece::Text(String::from("$")), char('$')),
    ))(input)
}

/// A function name, flagged when written as a placeholder
fn function_name(input: &str) -> IResult<&str, (&str, bool)> {
    alt((
        map(placeholder, |name| (name, true)),
        map(identifier, |name| (name, false)),
    ))(input)
}

fn separator(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0)(input)
}

fn argument(input: &str) -> IResult<&str, Arg> {
    map(
        separated_pair(type_name, multispace1, identifier),
        |(ty, name)| Arg::new(ty, name),
    )(input)
}

fn arguments(input: &str) -> IResult<&str, Vec<Arg>> {
    delimited(
        pair(char('('), multispace0),
        alt((
            value(Vec::new(), tag("void")),
            separated_list0(separator, argument),
        )),
        pair(multispace0, char(')')),
    )(input)
}

/// `vec4 $name(vec4 pos, float scale) {`
fn signature(input: &str) -> IResult<&str, Signature> {
    map(
        tuple((
            type_name,
            multispace1,
            function_name,
            multispace0,
            arguments,
            multispace0,
            char('{'),
        )),
        |(rtype, _, (name, anonymous), _, args, _, _)| Signature {
            name: name.to_string(),
            anonymous,
            args,
            rtype: rtype.to_string(),
        },
    )(input)
}

/// An argument of a prototype, whose name is optional
fn prototype_argument(input: &str) -> IResult<&str, &str> {
    terminated(type_name, opt(preceded(multispace1, identifier)))(input)
}

fn prototype(input: &str) -> IResult<&str, Prototype> {
    map(
        tuple((
            type_name,
            multispace1,
            identifier,
            multispace0,
            delimited(
                pair(char('('), multispace0),
                alt((
                    value(Vec::new(), tag("void")),
                    separated_list0(separator, prototype_argument),
                )),
                pair(multispace0, char(')')),
            ),
            multispace0,
            char(';'),
        )),
        |(rtype, _, name, _, arg_types, _, _)| Prototype {
            name: name.to_string(),
            arg_types: arg_types.into_iter().map(String::from).collect(),
            rtype: rtype.to_string(),
        },
    )(input)
}

/// `uniform vec4 a, b;` or `float x = 1.0;`
fn declaration(input: &str) -> IResult<&str, (Option<Qualifier>, &str, Vec<&str>)> {
    terminated(
        tuple((
            opt(terminated(qualifier, multispace1)),
            type_name,
            preceded(multispace1, separated_list1(separator, identifier)),
        )),
        pair(multispace0, alt((char('='), char(';')))),
    )(input)
}

/// Byte offsets of every line start in `code`
fn line_starts(code: &str) -> impl Iterator<Item = usize> + '_ {
    Some(0)
        .into_iter()
        .chain(code.match_indices('\n').map(|(index, _)| index + 1))
}

/// Return the signature of the first function definition found in `code`
pub fn parse_function_signature(code: &str) -> Result<Signature> {
    for start in line_starts(code) {
        if let Ok((_, sig)) = preceded(multispace0, signature)(&code[start..]) {
            return Ok(sig);
        }
    }

    let first_line = code.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    bail!(ErrorKind::ParseError(format!(
        "no function signature found (first line: `{}`)",
        first_line.trim()
    )))
}

/// Return the signature of every function defined in `code`
pub fn find_functions(code: &str) -> Vec<Signature> {
    line_starts(code)
        .filter_map(|start| preceded(multispace0, signature)(&code[start..]).ok())
        .map(|(_, sig)| sig)
        .collect()
}

/// Return the template variables of `code`, excluding the one naming the function itself
pub fn find_template_variables(code: &str, function_name: &str) -> Vec<String> {
    Template::parse(code)
        .placeholders()
        .into_iter()
        .filter(|name| name != function_name)
        .collect()
}

/// Return every function prototype declared in `code`, one per line
pub fn find_prototypes(code: &str) -> Vec<Prototype> {
    code.lines()
        .filter_map(|line| preceded(multispace0, prototype)(line).ok())
        .map(|(_, proto)| proto)
        .collect()
}

/// Return the program variables declared in `code`, one declaration per line
pub fn find_program_variables(code: &str) -> Vec<ProgramVariable> {
    let mut vars = Vec::new();
    for line in code.lines() {
        if let Ok((_, (qualifier, dtype, names))) = preceded(multispace0, declaration)(line) {
            vars.extend(names.into_iter().map(|name| ProgramVariable {
                name: name.to_string(),
                qualifier,
                dtype: dtype.to_string(),
            }));
        }
    }
    vars
}

/// Parse `qualifier dtype name` or `const dtype name value`
pub fn parse_declaration(decl: &str) -> Result<Declaration> {
    let fields: Vec<&str> = decl.split_whitespace().collect();

    let (qualifier, dtype, name, literal) = match fields[..] {
        [qualifier, dtype, name] => (qualifier, dtype, name, None),
        ["const", dtype, name, literal] => ("const", dtype, name, Some(literal)),
        _ => bail!(ErrorKind::ParseError(format!(
            "declarations have the form `qualifier dtype name` or `const dtype name value`, got `{}`",
            decl
        ))),
    };

    let qualifier = match Qualifier::from_keyword(qualifier) {
        Some(qualifier) => qualifier,
        None => bail!(ErrorKind::ParseError(format!("unknown qualifier `{}`", qualifier))),
    };

    if !types::is_type_name(dtype) {
        bail!(ErrorKind::ParseError(format!("unknown type `{}`", dtype)));
    }

    match identifier(name) {
        Ok(("", _)) => {}
        _ => bail!(ErrorKind::ParseError(format!("invalid variable name `{}`", name))),
    }

    let value = match literal {
        Some(literal) => Some(parse_literal(dtype, literal)?),
        None => None,
    };

    if qualifier == Qualifier::Const && value.is_none() {
        bail!(ErrorKind::ParseError(format!("const `{}` needs a value", name)));
    }

    Ok(Declaration {
        qualifier,
        dtype: dtype.to_string(),
        name: name.to_string(),
        value,
    })
}

fn parse_literal(dtype: &str, literal: &str) -> Result<Value> {
    let invalid = || ErrorKind::ParseError(format!("invalid `{}` literal `{}`", dtype, literal));

    Ok(match dtype {
        "float" => Value::Float(literal.parse().map_err(|_| invalid())?),
        "int" => Value::Int(literal.parse().map_err(|_| invalid())?),
        "bool" => Value::Bool(literal.parse().map_err(|_| invalid())?),
        _ => bail!(invalid()),
    })
}

/// Strip leading and trailing blank lines and the indentation common to all other lines
pub fn dedent(code: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();

    let first = match lines.iter().position(|line| !line.trim().is_empty()) {
        Some(first) => first,
        None => return String::new(),
    };
    let last = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(first);
    let lines = &lines[first..=last];

    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| if line.len() >= indent { &line[indent..] } else { line.trim_start() })
        .collect::<Vec<_>>()
        .join("\n")
}
