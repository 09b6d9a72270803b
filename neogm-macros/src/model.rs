use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, DeriveInput};

use crate::attrs::{self, Index, Model, Relation, Scalar};

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match attrs::parse(&ast) {
        Ok(model) => generate(&model).into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate(model: &Model) -> TokenStream2 {
    let name = model.ident;
    let type_name = &model.type_name;
    let state = model.state;

    let field_metas = model.scalars.iter().map(field_meta);
    let relation_decls = model.relations.iter().map(relation_decl);

    let scalar_idents: Vec<_> = model.scalars.iter().map(|s| s.ident).collect();
    let relation_idents: Vec<_> = model.relations.iter().map(|r| r.ident).collect();
    let skipped = &model.skipped;
    let properties = model.scalars.iter().map(|s| {
        let ident = s.ident;
        let field = &s.name;
        let property = &s.property;
        quote! {
            neogm_core::props::value(#type_name, #field, #property, &self.#ident)?
        }
    });

    let scalar_accessors = model.scalars.iter().map(|s| scalar_accessors(s, state));
    let relation_accessors = model
        .relations
        .iter()
        .enumerate()
        .map(|(idx, r)| relation_accessors(r, idx, state));

    quote! {
        impl neogm_core::GraphModel for #name {
            const TYPE_NAME: &'static str = #type_name;

            fn meta() -> &'static neogm_core::ModelMeta {
                static FIELDS: &[neogm_core::FieldMeta] = &[#(#field_metas),*];
                static RELATIONSHIPS: &[neogm_core::RelationshipDecl] = &[#(#relation_decls),*];
                static META: neogm_core::ModelMeta = neogm_core::ModelMeta {
                    type_name: #type_name,
                    fields: FIELDS,
                    relationships: RELATIONSHIPS,
                };
                &META
            }

            fn from_node(node: neogm_core::NodeRef) -> Self {
                #name {
                    #state: neogm_core::EntityState::attached(node),
                    #(#scalar_idents: ::std::default::Default::default(),)*
                    #(#relation_idents: ::std::default::Default::default(),)*
                    #(#skipped: ::std::default::Default::default(),)*
                }
            }

            fn state(&self) -> &neogm_core::EntityState {
                &self.#state
            }

            fn state_mut(&mut self) -> &mut neogm_core::EntityState {
                &mut self.#state
            }

            fn properties(
                &self,
            ) -> ::std::result::Result<::std::vec::Vec<(&'static str, neogm_core::BoltType)>, neogm_core::GraphError> {
                ::std::result::Result::Ok(::std::vec![#(#properties),*])
            }
        }

        impl #name {
            #(#scalar_accessors)*
            #(#relation_accessors)*
        }
    }
}

fn field_meta(s: &Scalar) -> TokenStream2 {
    let name = &s.name;
    let property = &s.property;
    let index = match &s.index {
        Some(index) => {
            let spec = index_spec(index);
            quote! { ::std::option::Option::Some(#spec) }
        }
        None => quote! { ::std::option::Option::None },
    };
    quote! {
        neogm_core::FieldMeta { name: #name, property: #property, index: #index }
    }
}

fn index_spec(index: &Index) -> TokenStream2 {
    let name = match &index.name {
        Some(n) => quote! { ::std::option::Option::Some(#n) },
        None => quote! { ::std::option::Option::None },
    };
    let kind = if index.fulltext {
        quote! { neogm_core::IndexKind::Fulltext }
    } else {
        quote! { neogm_core::IndexKind::Exact }
    };
    let lower_case = index.fulltext && index.lower_case;
    quote! {
        neogm_core::IndexSpec { name: #name, kind: #kind, lower_case: #lower_case }
    }
}

fn relation_decl(r: &Relation) -> TokenStream2 {
    let field = &r.name;
    let related = r.related;
    let rel_type = match &r.rel_type {
        Some(t) => quote! { ::std::option::Option::Some(#t) },
        None => quote! { ::std::option::Option::None },
    };
    let direction = match r.direction.as_str() {
        "incoming" => quote! { neogm_core::Direction::Incoming },
        "both" => quote! { neogm_core::Direction::Both },
        _ => quote! { neogm_core::Direction::Outgoing },
    };
    let traversal = if r.breadth_first {
        quote! { neogm_core::TraversalKind::BreadthFirst }
    } else {
        quote! { neogm_core::TraversalKind::OneHop }
    };
    let cardinality = if r.many {
        quote! { neogm_core::Cardinality::Many }
    } else {
        quote! { neogm_core::Cardinality::One }
    };
    quote! {
        neogm_core::RelationshipDecl {
            field: #field,
            related: <#related as neogm_core::GraphModel>::TYPE_NAME,
            rel_type: #rel_type,
            direction: #direction,
            traversal: #traversal,
            cardinality: #cardinality,
        }
    }
}

fn scalar_accessors(s: &Scalar, state: &syn::Ident) -> TokenStream2 {
    let ident = s.ident;
    let ty = s.ty;
    let name = &s.name;
    let property = &s.property;
    let setter = format_ident!("set_{}", name);
    quote! {
        pub fn #ident(&self) -> ::std::result::Result<#ty, neogm_core::GraphError> {
            neogm_core::props::read(
                &self.#state,
                <Self as neogm_core::GraphModel>::TYPE_NAME,
                #name,
                #property,
                &self.#ident,
            )
        }

        pub fn #setter(&mut self, value: #ty) {
            self.#ident = value;
            neogm_core::props::write(&mut self.#state, #property);
        }
    }
}

fn relation_accessors(r: &Relation, idx: usize, state: &syn::Ident) -> TokenStream2 {
    let ident = r.ident;
    let related = r.related;
    let relate = format_ident!("relate_{}", r.name);
    let unrelate = format_ident!("unrelate_{}", r.name);
    let decl = quote! {
        &<Self as neogm_core::GraphModel>::meta().relationships[#idx]
    };
    let getter = if r.many {
        quote! {
            pub fn #ident(&self) -> ::std::result::Result<neogm_core::Traversal<#related>, neogm_core::GraphError> {
                self.#ident.resolve(<Self as neogm_core::GraphModel>::TYPE_NAME, #decl, &self.#state)
            }
        }
    } else {
        quote! {
            pub fn #ident(&self) -> ::std::result::Result<::std::option::Option<#related>, neogm_core::GraphError> {
                self.#ident.resolve(<Self as neogm_core::GraphModel>::TYPE_NAME, #decl, &self.#state)
            }
        }
    };
    quote! {
        #getter

        pub fn #relate(&self, target: &#related) -> ::std::result::Result<neogm_core::RelationshipId, neogm_core::GraphError> {
            neogm_core::RelationshipFactory::relate(
                <Self as neogm_core::GraphModel>::TYPE_NAME,
                #decl,
                &self.#state,
                <#related as neogm_core::GraphModel>::TYPE_NAME,
                neogm_core::GraphModel::state(target),
            )
        }

        pub fn #unrelate(&self, target: &#related) -> ::std::result::Result<usize, neogm_core::GraphError> {
            neogm_core::RelationshipFactory::unrelate(
                <Self as neogm_core::GraphModel>::TYPE_NAME,
                #decl,
                &self.#state,
                <#related as neogm_core::GraphModel>::TYPE_NAME,
                neogm_core::GraphModel::state(target),
            )
        }
    }
}
