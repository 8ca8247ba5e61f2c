use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use proc_macro2::TokenStream;
use quote::quote;

const SCALARS: [(&str, &str); 5] = [
    ("bool", "b"),
    ("int", "i"),
    ("uint", "u"),
    ("float", ""),
    ("double", "d"),
];

const MATRICES: [&str; 2] = ["", "d"];

const SAMPLERS: [&str; 12] = [
    "sampler1D",
    "sampler2D",
    "sampler3D",
    "samplerCube",
    "sampler2DRect",
    "sampler1DShadow",
    "sampler2DShadow",
    "samplerCubeShadow",
    "sampler2DArray",
    "isampler2D",
    "usampler2D",
    "samplerExternalOES",
];

const KEYWORDS: [&str; 67] = [
    "attribute", "const", "uniform", "varying", "buffer", "shared", "layout",
    "centroid", "flat", "smooth", "noperspective", "patch", "sample",
    "break", "continue", "do", "for", "while", "switch", "case", "default",
    "if", "else", "subroutine", "in", "out", "inout", "true", "false",
    "invariant", "precise", "discard", "return", "struct", "precision",
    "lowp", "mediump", "highp", "common", "partition", "active", "asm",
    "class", "union", "enum", "typedef", "template", "this", "goto",
    "inline", "noinline", "volatile", "public", "static", "extern",
    "external", "interface", "long", "short", "half", "fixed", "unsigned",
    "superp", "input", "output", "sizeof", "main",
];

/// Every builtin type name a function signature may use
fn type_names() -> Vec<String> {
    let mut names = vec![String::from("void")];
    names.extend(SCALARS.iter().map(|&(scalar, _)| scalar.to_string()));

    for size in 2u32..=4u32 {
        for &(_, prefix) in SCALARS.iter() {
            names.push(format!("{}vec{}", prefix, size));
        }

        for &prefix in MATRICES.iter() {
            names.push(format!("{}mat{}", prefix, size));
            for rows in 2u32..=4u32 {
                names.push(format!("{}mat{}x{}", prefix, size, rows));
            }
        }
    }

    names.extend(SAMPLERS.iter().map(|sampler| sampler.to_string()));
    names
}

fn glsl(out_dir: &str) {
    let types = type_names();
    let keywords = KEYWORDS.iter();

    let tables: TokenStream = quote! {
        /// Whether `name` is a builtin GLSL type
        pub fn is_type_name(name: &str) -> bool {
            match name {
                #( #types )|* => true,
                _ => false,
            }
        }

        /// Whether `name` can never be handed out to an anonymous object:
        /// a GLSL keyword, a builtin type name, or the `main` entry point
        pub fn is_reserved(name: &str) -> bool {
            if is_type_name(name) {
                return true;
            }

            match name {
                #( #keywords )|* => true,
                _ => false,
            }
        }
    };

    let path = Path::new(out_dir).join("glsl.rs");
    let mut file = File::create(&path).unwrap();
    write!(file, "{}", tables).unwrap();
}

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    glsl(&out_dir);
}
