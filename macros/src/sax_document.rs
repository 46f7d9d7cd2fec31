use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Data, DeriveInput, Fields, GenericArgument, Ident, LitStr, Path, PathArguments, Token, Type,
    spanned::Spanned,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Element,
    Attribute,
    Value,
    Elements,
}

impl SourceKind {
    fn keyword(self) -> &'static str {
        match self {
            SourceKind::Element => "element",
            SourceKind::Attribute => "attribute",
            SourceKind::Value => "value",
            SourceKind::Elements => "elements",
        }
    }
}

/// One `#[sax(...)]` annotated field.
struct FieldSpec {
    ident: Ident,
    ty: Type,
    source: SourceKind,
    source_name: Option<LitStr>,
    nested: bool,
    lazy: bool,
    required: bool,
    value_attr: Option<LitStr>,
    with: Vec<(String, LitStr)>,
    setter: Option<Path>,
}

impl FieldSpec {
    fn target_name(&self) -> String {
        let name = self.ident.to_string();
        name.strip_prefix("r#").map(str::to_string).unwrap_or(name)
    }

    fn source_name(&self) -> String {
        self.source_name
            .as_ref()
            .map(LitStr::value)
            .unwrap_or_else(|| self.target_name())
    }

    fn is_collection(&self) -> bool {
        self.source == SourceKind::Elements
    }

    /// The type a nested object is parsed into.
    fn element_type(&self) -> &Type {
        let wrapper = if self.lazy {
            "Lazy"
        } else if self.is_collection() {
            "Vec"
        } else {
            "Option"
        };
        generic_arg(&self.ty, wrapper).unwrap_or(&self.ty)
    }
}

/// The single type argument of `ty` if its last path segment is `wrapper`.
fn generic_arg<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn parse_field(field: &syn::Field) -> syn::Result<Option<FieldSpec>> {
    let Some(ident) = field.ident.clone() else {
        return Ok(None);
    };

    let mut annotated = false;
    let mut source = None::<SourceKind>;
    let mut source_name = None;
    let mut nested = false;
    let mut lazy = false;
    let mut required = false;
    let mut value_attr = None;
    let mut with = Vec::new();
    let mut setter = None;

    for attr in field.attrs.iter().filter(|a| a.path().is_ident("sax")) {
        annotated = true;
        attr.parse_nested_meta(|meta| {
            let mut set_source = |kind: SourceKind| -> syn::Result<()> {
                if let Some(existing) = source {
                    return Err(meta.error(format!(
                        "field already declared as `{}`",
                        existing.keyword()
                    )));
                }
                source = Some(kind);
                Ok(())
            };

            if meta.path.is_ident("element") {
                set_source(SourceKind::Element)?;
                if meta.input.peek(Token![=]) {
                    source_name = Some(meta.value()?.parse()?);
                }
            } else if meta.path.is_ident("attribute") {
                set_source(SourceKind::Attribute)?;
                if meta.input.peek(Token![=]) {
                    source_name = Some(meta.value()?.parse()?);
                }
            } else if meta.path.is_ident("elements") {
                set_source(SourceKind::Elements)?;
                if meta.input.peek(Token![=]) {
                    source_name = Some(meta.value()?.parse()?);
                }
            } else if meta.path.is_ident("value") {
                // `value = "attr"` reads an attribute of the matched element;
                // bare `value` binds the object's own text.
                if meta.input.peek(Token![=]) {
                    value_attr = Some(meta.value()?.parse()?);
                } else {
                    set_source(SourceKind::Value)?;
                }
            } else if meta.path.is_ident("nested") {
                nested = true;
            } else if meta.path.is_ident("lazy") {
                lazy = true;
            } else if meta.path.is_ident("required") {
                required = true;
            } else if meta.path.is_ident("setter") {
                let path: LitStr = meta.value()?.parse()?;
                setter = Some(path.parse::<Path>()?);
            } else if meta.path.is_ident("with") {
                meta.parse_nested_meta(|inner| {
                    let key = inner
                        .path
                        .get_ident()
                        .map(Ident::to_string)
                        .ok_or_else(|| inner.error("expected an attribute name"))?;
                    let value: LitStr = inner.value()?.parse()?;
                    with.push((key, value));
                    Ok(())
                })?;
            } else {
                return Err(meta.error("unsupported sax option"));
            }
            Ok(())
        })?;
    }

    if !annotated {
        return Ok(None);
    }

    let Some(source) = source else {
        return Err(syn::Error::new(
            ident.span(),
            "expected one of `element`, `attribute`, `value` or `elements`",
        ));
    };

    let spec = FieldSpec {
        ident,
        ty: field.ty.clone(),
        source,
        source_name,
        nested,
        lazy,
        required,
        value_attr,
        with,
        setter,
    };
    validate(&spec)?;
    Ok(Some(spec))
}

fn validate(spec: &FieldSpec) -> syn::Result<()> {
    let span = spec.ident.span();
    let lazy_type = generic_arg(&spec.ty, "Lazy").is_some();

    if spec.lazy && spec.source != SourceKind::Elements {
        return Err(syn::Error::new(span, "`lazy` requires `elements`"));
    }
    if spec.lazy != lazy_type {
        return Err(syn::Error::new(
            spec.ty.span(),
            "a `lazy` field must have type `Lazy<T>`, and only `lazy` fields may",
        ));
    }
    if spec.setter.is_some() && (spec.nested || spec.lazy) {
        return Err(syn::Error::new(
            span,
            "`setter` cannot be combined with `nested` or `lazy`",
        ));
    }
    if spec.nested && spec.value_attr.is_some() {
        return Err(syn::Error::new(
            span,
            "`nested` content cannot be read from an attribute",
        ));
    }
    if spec.nested && matches!(spec.source, SourceKind::Attribute | SourceKind::Value) {
        return Err(syn::Error::new(span, "`nested` requires `element` or `elements`"));
    }
    if (!spec.with.is_empty() || spec.value_attr.is_some())
        && matches!(spec.source, SourceKind::Attribute | SourceKind::Value)
    {
        return Err(syn::Error::new(
            span,
            "`with` and `value = \"..\"` apply to element fields only",
        ));
    }
    Ok(())
}

pub fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "SaxDocument cannot be derived for generic types",
        ));
    }
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "SaxDocument can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new(
            input.ident.span(),
            "SaxDocument requires named fields",
        ));
    };

    let mut specs = Vec::new();
    for field in &named.named {
        if let Some(spec) = parse_field(field)? {
            specs.push(spec);
        }
    }

    let mut lazy_fields = specs.iter().filter(|s| s.lazy);
    let lazy = lazy_fields.next();
    if let Some(second) = lazy_fields.next() {
        return Err(syn::Error::new(
            second.ident.span(),
            "only one `lazy` field is allowed per type",
        ));
    }
    let mut value_fields = specs.iter().filter(|s| s.source == SourceKind::Value);
    value_fields.next();
    if let Some(second) = value_fields.next() {
        return Err(syn::Error::new(
            second.ident.span(),
            "only one `value` field is allowed per type",
        ));
    }

    let name = &input.ident;
    let type_name = name.to_string();
    let declarations = specs.iter().map(declaration);
    let scalars = specs.iter().filter(|s| !s.is_collection()).map(scalar_arm);
    let appends = specs.iter().filter(|s| s.is_collection()).map(append_arm);

    let (item_type, lazy_body) = match lazy {
        Some(spec) => {
            let ident = &spec.ident;
            let item = spec.element_type();
            (quote!(#item), quote!(::core::option::Option::Some(&mut self.#ident)))
        }
        None => (quote!(()), quote!(::core::option::Option::None)),
    };

    let unknown = quote! {
        return ::core::result::Result::Err(::saxmap::Error::UnknownField {
            type_name: #type_name,
            field: field.target_name().to_string(),
        })
    };

    Ok(quote! {
        impl ::saxmap::Mapped for #name {
            fn mapped_schema(&self) -> &'static ::saxmap::Schema {
                <Self as ::saxmap::SaxDocument>::schema()
            }

            #[allow(unused_variables, unreachable_code)]
            fn set_scalar(
                &mut self,
                field: &::saxmap::FieldDescriptor,
                item: ::saxmap::Item,
            ) -> ::core::result::Result<(), ::saxmap::Error> {
                match field.target_name() {
                    #(#scalars)*
                    _ => #unknown,
                }
                ::core::result::Result::Ok(())
            }

            #[allow(unused_variables, unreachable_code)]
            fn append(
                &mut self,
                field: &::saxmap::FieldDescriptor,
                item: ::saxmap::Item,
            ) -> ::core::result::Result<(), ::saxmap::Error> {
                match field.target_name() {
                    #(#appends)*
                    _ => #unknown,
                }
                ::core::result::Result::Ok(())
            }

            fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn ::core::any::Any> {
                self
            }
        }

        impl ::saxmap::SaxDocument for #name {
            type Item = #item_type;

            fn schema() -> &'static ::saxmap::Schema {
                static SCHEMA: ::std::sync::OnceLock<::saxmap::Schema> = ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| {
                    ::saxmap::Schema::builder(#type_name)
                        #(#declarations)*
                        .build()
                })
            }

            fn lazy_field(&mut self) -> ::core::option::Option<&mut ::saxmap::Lazy<Self::Item>> {
                #lazy_body
            }
        }
    })
}

fn declaration(spec: &FieldSpec) -> TokenStream {
    let target = spec.target_name();
    let source = spec.source_name();

    let mut options = quote!(::saxmap::FieldOptions::new().as_name(#target));
    if spec.nested {
        let nested = spec.element_type();
        options.extend(quote!(.class(::saxmap::NestedType::of::<#nested>())));
    }
    if spec.lazy {
        options.extend(quote!(.lazy(true)));
    }
    if spec.required {
        options.extend(quote!(.required()));
    }
    if let Some(attr) = &spec.value_attr {
        options.extend(quote!(.value_attr(#attr)));
    }
    for (key, value) in &spec.with {
        options.extend(quote!(.with_attr(#key, #value)));
    }
    if spec.setter.is_some() {
        options.extend(quote!(.custom_accessor()));
    }

    match spec.source {
        SourceKind::Element => quote!(.element(#source, #options)),
        SourceKind::Attribute => quote!(.attribute(#source, #options)),
        SourceKind::Value => quote!(.value(#options)),
        SourceKind::Elements => quote!(.elements(#source, #options)),
    }
}

/// Expression converting `item` into the field's text-backed value.
fn converted() -> TokenStream {
    quote! {
        ::saxmap::FromMarkup::from_markup(item.into_text(field)?)
            .map_err(|e| e.into_error(field))?
    }
}

fn custom_setter(setter: &Path) -> TokenStream {
    quote! {
        #setter(self, item.into_text(field)?).map_err(|e| e.into_error(field))?;
    }
}

fn scalar_arm(spec: &FieldSpec) -> TokenStream {
    let target = spec.target_name();
    let ident = &spec.ident;

    let body = if let Some(setter) = &spec.setter {
        custom_setter(setter)
    } else if spec.nested {
        if generic_arg(&spec.ty, "Option").is_some() {
            quote!(self.#ident = ::core::option::Option::Some(item.into_nested(field)?);)
        } else {
            quote!(self.#ident = item.into_nested(field)?;)
        }
    } else {
        let value = converted();
        quote!(self.#ident = #value;)
    };

    quote!(#target => { #body })
}

fn append_arm(spec: &FieldSpec) -> TokenStream {
    let target = spec.target_name();
    let ident = &spec.ident;

    let body = if let Some(setter) = &spec.setter {
        custom_setter(setter)
    } else if spec.lazy {
        let value = if spec.nested {
            quote!(item.into_nested(field)?)
        } else {
            converted()
        };
        quote!(self.#ident.push(#value)?;)
    } else if spec.nested {
        quote!(self.#ident.push(item.into_nested(field)?);)
    } else {
        let value = converted();
        quote!(self.#ident.push(#value);)
    };

    quote!(#target => { #body })
}
