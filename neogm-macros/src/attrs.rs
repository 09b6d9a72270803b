//! `#[graph(...)]` attribute parsing.

use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{
    DeriveInput, Field, GenericArgument, Ident, LitBool, LitStr, PathArguments, Type, TypePath,
};

/// Property names the mapper writes itself: the key plus the default
/// discriminator and counter names.
const RESERVED: &[&str] = &["key", "_type", "_next_key"];

pub struct Model<'a> {
    pub ident: &'a Ident,
    pub type_name: String,
    pub state: &'a Ident,
    pub scalars: Vec<Scalar<'a>>,
    pub relations: Vec<Relation<'a>>,
    /// Fields the mapper ignores; default-initialised by the node constructor.
    pub skipped: Vec<&'a Ident>,
}

pub struct Scalar<'a> {
    pub ident: &'a Ident,
    pub ty: &'a Type,
    pub name: String,
    pub property: String,
    pub index: Option<Index>,
}

pub struct Index {
    pub name: Option<String>,
    pub fulltext: bool,
    pub lower_case: bool,
}

pub struct Relation<'a> {
    pub ident: &'a Ident,
    pub name: String,
    pub related: &'a Type,
    pub many: bool,
    pub breadth_first: bool,
    pub rel_type: Option<String>,
    pub direction: String,
}

#[derive(Default)]
struct FieldAttrs {
    skip: bool,
    prop: Option<String>,
    index: Option<Index>,
    relation: Option<(bool, Option<String>, String)>,
}

pub fn parse(ast: &DeriveInput) -> syn::Result<Model<'_>> {
    if !ast.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&ast.generics, "GraphModel does not support generic structs"));
    }
    let fields = match &ast.data {
        syn::Data::Struct(s) => match &s.fields {
            syn::Fields::Named(named) => &named.named,
            _ => return Err(syn::Error::new_spanned(ast, "GraphModel only supports structs with named fields")),
        },
        _ => return Err(syn::Error::new_spanned(ast, "GraphModel only supports structs")),
    };

    let mut state = None;
    let mut scalars = Vec::new();
    let mut relations = Vec::new();
    let mut skipped = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else { continue };
        let attrs = field_attrs(field)?;
        let name = ident.unraw().to_string();

        if type_ident(&field.ty).is_some_and(|t| t == "EntityState") {
            if state.replace(ident).is_some() {
                return Err(syn::Error::new_spanned(field, "only one EntityState field is allowed"));
            }
            continue;
        }
        if attrs.skip {
            skipped.push(ident);
            continue;
        }
        if let Some((many, related)) = relation_type(&field.ty) {
            let (breadth_first, rel_type, direction) =
                attrs.relation.unwrap_or((false, None, "outgoing".to_owned()));
            relations.push(Relation { ident, name, related, many, breadth_first, rel_type, direction });
            continue;
        }
        if attrs.relation.is_some() {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "relationship fields must be Related<T> or RelatedMany<T>",
            ));
        }
        let property = attrs.prop.unwrap_or_else(|| name.clone());
        if RESERVED.contains(&property.as_str()) {
            return Err(syn::Error::new_spanned(
                field,
                format!("property '{property}' is reserved by the mapper"),
            ));
        }
        scalars.push(Scalar { ident, ty: &field.ty, name, property, index: attrs.index });
    }

    let state = state.ok_or_else(|| {
        syn::Error::new_spanned(&ast.ident, "GraphModel needs a field of type EntityState")
    })?;

    Ok(Model {
        ident: &ast.ident,
        type_name: type_name(ast)?,
        state,
        scalars,
        relations,
        skipped,
    })
}

fn type_name(ast: &DeriveInput) -> syn::Result<String> {
    let mut name = None;
    for attr in ast.attrs.iter().filter(|a| a.path().is_ident("graph")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type_name") {
                name = Some(string_value(&meta)?);
                Ok(())
            } else {
                Err(meta.error("unknown graph attribute; expected `type_name`"))
            }
        })?;
    }
    Ok(name.unwrap_or_else(|| ast.ident.unraw().to_string()))
}

fn field_attrs(field: &Field) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("graph")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                out.skip = true;
            } else if meta.path.is_ident("prop") {
                out.prop = Some(string_value(&meta)?);
            } else if meta.path.is_ident("index") {
                out.index = Some(index(&meta)?);
            } else if meta.path.is_ident("related_to") {
                out.relation = Some(relation(&meta, false)?);
            } else if meta.path.is_ident("related_via") {
                out.relation = Some(relation(&meta, true)?);
            } else {
                return Err(meta.error("unknown graph attribute"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

fn index(meta: &ParseNestedMeta) -> syn::Result<Index> {
    let mut index = Index { name: None, fulltext: false, lower_case: true };
    if !meta.input.peek(syn::token::Paren) {
        return Ok(index);
    }
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("name") {
            index.name = Some(string_value(&inner)?);
        } else if inner.path.is_ident("kind") {
            let kind: LitStr = inner.value()?.parse()?;
            index.fulltext = match kind.value().as_str() {
                "exact" => false,
                "fulltext" => true,
                _ => return Err(syn::Error::new_spanned(kind, "index kind must be \"exact\" or \"fulltext\"")),
            };
        } else if inner.path.is_ident("lower_case") {
            let flag: LitBool = inner.value()?.parse()?;
            index.lower_case = flag.value;
        } else {
            return Err(inner.error("unknown index option; expected `name`, `kind` or `lower_case`"));
        }
        Ok(())
    })?;
    Ok(index)
}

fn relation(meta: &ParseNestedMeta, breadth_first: bool) -> syn::Result<(bool, Option<String>, String)> {
    let mut rel_type = None;
    let mut direction = "outgoing".to_owned();
    if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| {
            if inner.path.is_ident("rel_type") {
                rel_type = Some(string_value(&inner)?);
            } else if inner.path.is_ident("direction") {
                let lit: LitStr = inner.value()?.parse()?;
                let value = lit.value().to_ascii_lowercase();
                if !matches!(value.as_str(), "outgoing" | "incoming" | "both") {
                    return Err(syn::Error::new_spanned(
                        lit,
                        "direction must be \"outgoing\", \"incoming\" or \"both\"",
                    ));
                }
                direction = value;
            } else {
                return Err(inner.error("unknown relationship option; expected `rel_type` or `direction`"));
            }
            Ok(())
        })?;
    }
    Ok((breadth_first, rel_type, direction))
}

fn string_value(meta: &ParseNestedMeta) -> syn::Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

fn type_ident(ty: &Type) -> Option<&Ident> {
    match ty {
        Type::Path(TypePath { qself: None, path }) => path.segments.last().map(|s| &s.ident),
        _ => None,
    }
}

/// `Related<T>` → `(false, T)`, `RelatedMany<T>` → `(true, T)`.
fn relation_type(ty: &Type) -> Option<(bool, &Type)> {
    let Type::Path(TypePath { qself: None, path }) = ty else {
        return None;
    };
    let segment = path.segments.last()?;
    let many = match segment.ident.to_string().as_str() {
        "RelatedMany" => true,
        "Related" => false,
        _ => return None,
    };
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some((many, inner)),
        _ => None,
    })
}
