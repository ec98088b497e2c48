//! Procedural macros for Roster
//!
//! This crate provides macros to reduce boilerplate in the Roster backend:
//!
//! - `GraphQLEntity` - Derive the database descriptors and GraphQL input types for an entity
//! - `GraphQLOperations` - Derive the named CRUD query/mutation resolvers for an entity

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr, Type};

/// Derive the full database mapping for an entity struct.
///
/// # Usage
///
/// ```ignore
/// #[derive(GraphQLEntity, GraphQLOperations, SimpleObject, Clone, Debug, Serialize, Deserialize)]
/// #[graphql_entity(table = "users", plural = "Users")]
/// pub struct User {
///     #[primary_key]
///     pub id: i64,
///     /// Firstname of user
///     pub firstname: String,
///     pub created: String,
///     pub updated: String,
///     pub deleted: Option<String>,
///     #[graphql(skip)]
///     #[serde(skip)]
///     #[skip_db]
///     #[relation(join_table = "users_tags", owner_column = "user_id", related_column = "tag_id", related_table = "tags")]
///     pub tags: Vec<Tag>,
///     // related_key names the related table's primary key; it defaults to "id"
/// }
/// ```
///
/// # Generated Code
///
/// - `impl DatabaseEntity` with table/plural/primary-key metadata and the
///   `CreateInput`/`UpdateInput` associated types
/// - `impl DatabaseSchema` with column and relation descriptors derived from
///   the field types (`i64`/`i32` -> INTEGER, `f64` -> REAL, `bool` -> INTEGER,
///   `String` -> TEXT, `Option<T>` -> nullable T)
/// - `impl FromSqlRow` decoding each mapped column; skipped fields default
/// - `Create<Entity>Input` / `Update<Entity>Input` GraphQL input objects with
///   the entity's doc comments carried over as field descriptions
///
/// Fields named `created`, `updated` and `deleted` are managed by the data
/// service and never appear in the generated inputs.
#[proc_macro_derive(
    GraphQLEntity,
    attributes(graphql_entity, primary_key, skip_db, relation)
)]
pub fn derive_graphql_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_entity(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

/// Derive the named CRUD resolvers for an entity.
///
/// # Usage
///
/// Applied alongside `GraphQLEntity`; reads the same `#[graphql_entity]`
/// attribute for naming.
///
/// # Generated Code
///
/// For `User` with `plural = "Users"`:
///
/// - `UserQueries` exposing `getUsers`, `getUser`, `getUserByField` and
///   `getAllUserByField`
/// - `UserMutations` exposing `createUser`, `updateUser` and `removeUser`
///
/// Both are unit structs deriving `Default` so they can be merged into the
/// schema roots, and every resolver pulls `DataService<Entity>` out of the
/// GraphQL context.
#[proc_macro_derive(GraphQLOperations, attributes(graphql_entity))]
pub fn derive_graphql_operations(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_operations(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

// ============================================================================
// Attribute parsing
// ============================================================================

/// Struct-level `#[graphql_entity(...)]` settings, with defaults filled in.
struct EntityAttrs {
    table: String,
    plural: String,
    default_sort: Option<String>,
}

fn parse_entity_attrs(input: &DeriveInput) -> syn::Result<EntityAttrs> {
    let mut table = None;
    let mut plural = None;
    let mut default_sort = None;

    for attr in &input.attrs {
        if !attr.path().is_ident("graphql_entity") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                table = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("plural") {
                plural = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else if meta.path.is_ident("default_sort") {
                default_sort = Some(meta.value()?.parse::<LitStr>()?.value());
                Ok(())
            } else {
                Err(meta.error("unsupported graphql_entity option"))
            }
        })?;
    }

    let name = input.ident.to_string();
    Ok(EntityAttrs {
        table: table.unwrap_or_else(|| default_table_name(&name)),
        plural: plural.unwrap_or_else(|| format!("{}s", name)),
        default_sort,
    })
}

/// Default table name: snake_case plural of the struct name.
fn default_table_name(entity: &str) -> String {
    format!("{}s", entity.to_case(Case::Snake))
}

/// GraphQL type name for a generated input: `("Create", "User")` -> `createUserInput`.
fn input_graphql_name(prefix: &str, entity: &str) -> String {
    format!("{}{}Input", prefix, entity).to_case(Case::Camel)
}

// ============================================================================
// Field analysis
// ============================================================================

#[derive(Clone, Copy, PartialEq)]
enum Scalar {
    Int64,
    Int32,
    Float64,
    Boolean,
    Text,
}

impl Scalar {
    fn sql_type(self) -> &'static str {
        match self {
            Scalar::Int64 | Scalar::Int32 | Scalar::Boolean => "INTEGER",
            Scalar::Float64 => "REAL",
            Scalar::Text => "TEXT",
        }
    }

    fn rust_type(self) -> proc_macro2::TokenStream {
        match self {
            Scalar::Int64 => quote!(i64),
            Scalar::Int32 => quote!(i32),
            Scalar::Float64 => quote!(f64),
            Scalar::Boolean => quote!(bool),
            Scalar::Text => quote!(String),
        }
    }
}

/// A field mapped to a database column.
struct DbField {
    ident: syn::Ident,
    column: String,
    scalar: Scalar,
    nullable: bool,
    is_primary_key: bool,
    docs: Vec<Attribute>,
}

impl DbField {
    /// Managed audit columns are written by the data service, never by inputs.
    fn is_managed(&self) -> bool {
        matches!(self.column.as_str(), "created" | "updated" | "deleted")
    }
}

/// A `#[relation(...)]` field backed by a join table instead of a column.
struct RelationField {
    name: String,
    join_table: String,
    owner_column: String,
    related_column: String,
    related_table: String,
    related_key: String,
}

/// A field excluded from the database entirely (`#[skip_db]`).
struct SkippedField {
    ident: syn::Ident,
}

struct EntityFields {
    db: Vec<DbField>,
    relations: Vec<RelationField>,
    skipped: Vec<SkippedField>,
}

fn classify_type(ty: &Type) -> Option<(Scalar, bool)> {
    let Type::Path(path) = ty else { return None };
    let segment = path.path.segments.last()?;
    let ident = segment.ident.to_string();
    match ident.as_str() {
        "i64" => Some((Scalar::Int64, false)),
        "i32" => Some((Scalar::Int32, false)),
        "f64" => Some((Scalar::Float64, false)),
        "bool" => Some((Scalar::Boolean, false)),
        "String" => Some((Scalar::Text, false)),
        "Option" => {
            let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
                return None;
            };
            let syn::GenericArgument::Type(inner) = args.args.first()? else {
                return None;
            };
            let (scalar, nullable) = classify_type(inner)?;
            if nullable {
                return None;
            }
            Some((scalar, true))
        }
        _ => None,
    }
}

fn collect_fields(input: &DeriveInput) -> syn::Result<EntityFields> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            input,
            "GraphQLEntity can only be derived for structs",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            input,
            "GraphQLEntity requires named fields",
        ));
    };

    let mut db = Vec::new();
    let mut relations = Vec::new();
    let mut skipped = Vec::new();

    for field in &fields.named {
        let ident = field.ident.clone().expect("named field");
        let skip_db = field.attrs.iter().any(|a| a.path().is_ident("skip_db"));
        let relation_attr = field.attrs.iter().find(|a| a.path().is_ident("relation"));

        if let Some(attr) = relation_attr {
            if !skip_db {
                return Err(syn::Error::new_spanned(
                    field,
                    "#[relation] fields must also carry #[skip_db]",
                ));
            }
            relations.push(parse_relation(&ident, attr)?);
            skipped.push(SkippedField { ident });
            continue;
        }
        if skip_db {
            skipped.push(SkippedField { ident });
            continue;
        }

        let Some((scalar, nullable)) = classify_type(&field.ty) else {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "unsupported column type; expected i64, i32, f64, bool, String or Option of one of those",
            ));
        };
        let is_primary_key = field.attrs.iter().any(|a| a.path().is_ident("primary_key"));
        if is_primary_key && (scalar != Scalar::Int64 || nullable) {
            return Err(syn::Error::new_spanned(
                field,
                "#[primary_key] fields must be i64",
            ));
        }
        let docs = field
            .attrs
            .iter()
            .filter(|a| a.path().is_ident("doc"))
            .cloned()
            .collect();
        db.push(DbField {
            column: ident.to_string(),
            ident,
            scalar,
            nullable,
            is_primary_key,
            docs,
        });
    }

    Ok(EntityFields {
        db,
        relations,
        skipped,
    })
}

fn parse_relation(ident: &syn::Ident, attr: &Attribute) -> syn::Result<RelationField> {
    let mut join_table = None;
    let mut owner_column = None;
    let mut related_column = None;
    let mut related_table = None;
    let mut related_key = None;

    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("join_table") {
            join_table = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        } else if meta.path.is_ident("owner_column") {
            owner_column = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        } else if meta.path.is_ident("related_column") {
            related_column = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        } else if meta.path.is_ident("related_table") {
            related_table = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        } else if meta.path.is_ident("related_key") {
            related_key = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        } else {
            Err(meta.error("unsupported relation option"))
        }
    })?;

    let require = |value: Option<String>, key: &str| {
        value.ok_or_else(|| {
            syn::Error::new_spanned(attr, format!("#[relation] is missing `{}`", key))
        })
    };

    Ok(RelationField {
        name: ident.to_string(),
        join_table: require(join_table, "join_table")?,
        owner_column: require(owner_column, "owner_column")?,
        related_column: require(related_column, "related_column")?,
        related_table: require(related_table, "related_table")?,
        related_key: related_key.unwrap_or_else(|| "id".to_string()),
    })
}

// ============================================================================
// GraphQLEntity expansion
// ============================================================================

fn expand_entity(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let attrs = parse_entity_attrs(input)?;
    let fields = collect_fields(input)?;

    let primary_keys: Vec<&DbField> = fields.db.iter().filter(|f| f.is_primary_key).collect();
    let pk = match primary_keys.as_slice() {
        [pk] => *pk,
        [] => {
            return Err(syn::Error::new_spanned(
                input,
                "exactly one field must carry #[primary_key]",
            ))
        }
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "only one field may carry #[primary_key]",
            ))
        }
    };

    let ident = &input.ident;
    let entity_name = ident.to_string();
    let table = &attrs.table;
    let plural = &attrs.plural;
    let pk_column = &pk.column;
    let default_sort = attrs.default_sort.as_deref().unwrap_or(pk_column);

    let create_ident = format_ident!("Create{}Input", ident);
    let update_ident = format_ident!("Update{}Input", ident);
    let create_name = LitStr::new(&input_graphql_name("Create", &entity_name), Span::call_site());
    let update_name = LitStr::new(&input_graphql_name("Update", &entity_name), Span::call_site());

    let column_names: Vec<&str> = fields.db.iter().map(|f| f.column.as_str()).collect();
    let column_defs = fields.db.iter().map(|f| {
        let name = &f.column;
        let sql_type = f.scalar.sql_type();
        let nullable = f.nullable;
        let is_primary_key = f.is_primary_key;
        quote! {
            crate::orm::ColumnDef {
                name: #name,
                sql_type: #sql_type,
                nullable: #nullable,
                is_primary_key: #is_primary_key,
                default: None,
            }
        }
    });
    let relation_defs = fields.relations.iter().map(|r| {
        let name = &r.name;
        let join_table = &r.join_table;
        let owner_column = &r.owner_column;
        let related_column = &r.related_column;
        let related_table = &r.related_table;
        let related_key = &r.related_key;
        quote! {
            crate::orm::RelationDef {
                name: #name,
                join_table: #join_table,
                owner_column: #owner_column,
                related_column: #related_column,
                related_table: #related_table,
                related_key: #related_key,
            }
        }
    });

    let row_fields = fields.db.iter().map(|f| {
        let ident = &f.ident;
        let column = &f.column;
        quote! { #ident: row.try_get(#column)? }
    });
    let default_fields = fields.skipped.iter().map(|f| {
        let ident = &f.ident;
        quote! { #ident: Default::default() }
    });

    // Domain fields: everything an API caller may set.
    let domain: Vec<&DbField> = fields
        .db
        .iter()
        .filter(|f| !f.is_primary_key && !f.is_managed())
        .collect();

    let create_fields = domain.iter().map(|f| {
        let ident = &f.ident;
        let docs = &f.docs;
        let base = f.scalar.rust_type();
        let ty = if f.nullable {
            quote!(Option<#base>)
        } else {
            base
        };
        quote! {
            #(#docs)*
            pub #ident: #ty
        }
    });
    let create_values = domain.iter().map(|f| create_value_entry(f));

    let pk_ident = &pk.ident;
    let update_fields = domain.iter().map(|f| {
        let ident = &f.ident;
        let docs = &f.docs;
        let base = f.scalar.rust_type();
        quote! {
            #(#docs)*
            pub #ident: Option<#base>
        }
    });
    let update_pushes = domain.iter().map(|f| update_value_push(f));

    Ok(quote! {
        impl crate::orm::DatabaseEntity for #ident {
            const TABLE_NAME: &'static str = #table;
            const ENTITY_NAME: &'static str = #entity_name;
            const PLURAL_NAME: &'static str = #plural;
            const PRIMARY_KEY: &'static str = #pk_column;
            const DEFAULT_SORT: &'static str = #default_sort;

            type CreateInput = #create_ident;
            type UpdateInput = #update_ident;

            fn column_names() -> &'static [&'static str] {
                &[#(#column_names),*]
            }
        }

        impl crate::orm::DatabaseSchema for #ident {
            fn columns() -> &'static [crate::orm::ColumnDef] {
                &[#(#column_defs),*]
            }

            fn relations() -> &'static [crate::orm::RelationDef] {
                &[#(#relation_defs),*]
            }
        }

        impl crate::orm::FromSqlRow for #ident {
            fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
                use sqlx::Row;
                Ok(Self {
                    #(#row_fields,)*
                    #(#default_fields,)*
                })
            }
        }

        #[derive(Debug, Clone, async_graphql::InputObject)]
        #[graphql(name = #create_name)]
        pub struct #create_ident {
            #(#create_fields,)*
        }

        impl crate::orm::EntityInput for #create_ident {
            fn values(&self) -> Vec<(&'static str, crate::orm::SqlValue)> {
                vec![#(#create_values),*]
            }
        }

        #[derive(Debug, Clone, async_graphql::InputObject)]
        #[graphql(name = #update_name)]
        pub struct #update_ident {
            pub #pk_ident: i64,
            #(#update_fields,)*
        }

        impl crate::orm::EntityInput for #update_ident {
            fn values(&self) -> Vec<(&'static str, crate::orm::SqlValue)> {
                let mut values = Vec::new();
                #(#update_pushes)*
                values
            }
        }

        impl crate::orm::EntityUpdate for #update_ident {
            fn id(&self) -> i64 {
                self.#pk_ident
            }
        }
    })
}

/// `(column, SqlValue)` tuple for one create-input field.
fn create_value_entry(f: &DbField) -> proc_macro2::TokenStream {
    let ident = &f.ident;
    let column = &f.column;
    if f.nullable {
        let some = owned_sql_value(f.scalar, quote!(v));
        quote! {
            (#column, match &self.#ident {
                Some(v) => #some,
                None => crate::orm::SqlValue::Null,
            })
        }
    } else {
        let value = field_sql_value(f.scalar, ident);
        quote! { (#column, #value) }
    }
}

/// `if let Some(..)` push for one update-input field.
fn update_value_push(f: &DbField) -> proc_macro2::TokenStream {
    let ident = &f.ident;
    let column = &f.column;
    let value = owned_sql_value(f.scalar, quote!(v));
    quote! {
        if let Some(v) = &self.#ident {
            values.push((#column, #value));
        }
    }
}

/// SqlValue construction from a direct `self.field` access.
fn field_sql_value(scalar: Scalar, ident: &syn::Ident) -> proc_macro2::TokenStream {
    match scalar {
        Scalar::Int64 => quote!(crate::orm::SqlValue::Int(self.#ident)),
        Scalar::Int32 => quote!(crate::orm::SqlValue::Int(i64::from(self.#ident))),
        Scalar::Float64 => quote!(crate::orm::SqlValue::Float(self.#ident)),
        Scalar::Boolean => quote!(crate::orm::SqlValue::Bool(self.#ident)),
        Scalar::Text => quote!(crate::orm::SqlValue::String(self.#ident.clone())),
    }
}

/// SqlValue construction from a borrowed binding (inside `if let Some(v)`).
fn owned_sql_value(scalar: Scalar, binding: proc_macro2::TokenStream) -> proc_macro2::TokenStream {
    match scalar {
        Scalar::Int64 => quote!(crate::orm::SqlValue::Int(*#binding)),
        Scalar::Int32 => quote!(crate::orm::SqlValue::Int(i64::from(*#binding))),
        Scalar::Float64 => quote!(crate::orm::SqlValue::Float(*#binding)),
        Scalar::Boolean => quote!(crate::orm::SqlValue::Bool(*#binding)),
        Scalar::Text => quote!(crate::orm::SqlValue::String(#binding.clone())),
    }
}

// ============================================================================
// GraphQLOperations expansion
// ============================================================================

fn expand_operations(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let attrs = parse_entity_attrs(input)?;
    let ident = &input.ident;
    let entity_name = ident.to_string();
    let plural = &attrs.plural;

    let queries_ident = format_ident!("{}Queries", ident);
    let mutations_ident = format_ident!("{}Mutations", ident);
    let create_ident = format_ident!("Create{}Input", ident);
    let update_ident = format_ident!("Update{}Input", ident);

    let lit = |s: String| LitStr::new(&s, Span::call_site());
    let get_all_name = lit(format!("get{}", plural));
    let get_one_name = lit(format!("get{}", entity_name));
    let by_field_name = lit(format!("get{}ByField", entity_name));
    let all_by_field_name = lit(format!("getAll{}ByField", entity_name));
    let create_name = lit(format!("create{}", entity_name));
    let update_name = lit(format!("update{}", entity_name));
    let remove_name = lit(format!("remove{}", entity_name));
    let create_arg_name = lit(input_graphql_name("Create", &entity_name));
    let update_arg_name = lit(input_graphql_name("Update", &entity_name));

    let get_all_doc = lit(format!("Fetch every live {}", plural));
    let get_one_doc = lit(format!("Fetch a single {} by id", entity_name));
    let by_field_doc = lit(format!(
        "Fetch the first live {} whose column matches a value",
        entity_name
    ));
    let all_by_field_doc = lit(format!(
        "Fetch every live {} whose column matches a value",
        entity_name
    ));
    let create_doc = lit(format!("Create a new {}", entity_name));
    let update_doc = lit(format!("Apply a partial update to a {} by id", entity_name));
    let remove_doc = lit(format!("Soft-delete a {} by id", entity_name));

    Ok(quote! {
        #[derive(Default)]
        pub struct #queries_ident;

        #[async_graphql::Object]
        impl #queries_ident {
            #[doc = #get_all_doc]
            #[graphql(name = #get_all_name)]
            async fn find_all(
                &self,
                ctx: &async_graphql::Context<'_>,
            ) -> async_graphql::Result<Vec<#ident>> {
                let service = ctx.data_unchecked::<crate::orm::DataService<#ident>>();
                service
                    .find_all()
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))
            }

            #[doc = #get_one_doc]
            #[graphql(name = #get_one_name)]
            async fn find_one(
                &self,
                ctx: &async_graphql::Context<'_>,
                id: i64,
            ) -> async_graphql::Result<Option<#ident>> {
                let service = ctx.data_unchecked::<crate::orm::DataService<#ident>>();
                service
                    .find_one(id)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))
            }

            #[doc = #by_field_doc]
            #[graphql(name = #by_field_name)]
            async fn find_by_field_one(
                &self,
                ctx: &async_graphql::Context<'_>,
                field: String,
                value: String,
            ) -> async_graphql::Result<Option<#ident>> {
                let service = ctx.data_unchecked::<crate::orm::DataService<#ident>>();
                service
                    .find_by_field_one(&field, &value)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))
            }

            #[doc = #all_by_field_doc]
            #[graphql(name = #all_by_field_name)]
            async fn find_by_field_all(
                &self,
                ctx: &async_graphql::Context<'_>,
                field: String,
                value: String,
            ) -> async_graphql::Result<Vec<#ident>> {
                let service = ctx.data_unchecked::<crate::orm::DataService<#ident>>();
                service
                    .find_by_field_all(&field, &value)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))
            }
        }

        #[derive(Default)]
        pub struct #mutations_ident;

        #[async_graphql::Object]
        impl #mutations_ident {
            #[doc = #create_doc]
            #[graphql(name = #create_name)]
            async fn create(
                &self,
                ctx: &async_graphql::Context<'_>,
                #[graphql(name = #create_arg_name)] input: #create_ident,
            ) -> async_graphql::Result<#ident> {
                let service = ctx.data_unchecked::<crate::orm::DataService<#ident>>();
                service
                    .create(&input)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))
            }

            #[doc = #update_doc]
            #[graphql(name = #update_name)]
            async fn update(
                &self,
                ctx: &async_graphql::Context<'_>,
                #[graphql(name = #update_arg_name)] input: #update_ident,
            ) -> async_graphql::Result<Option<#ident>> {
                let service = ctx.data_unchecked::<crate::orm::DataService<#ident>>();
                service
                    .update(&input)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))
            }

            #[doc = #remove_doc]
            #[graphql(name = #remove_name)]
            async fn remove(
                &self,
                ctx: &async_graphql::Context<'_>,
                id: i64,
            ) -> async_graphql::Result<bool> {
                let service = ctx.data_unchecked::<crate::orm::DataService<#ident>>();
                service
                    .remove(id)
                    .await
                    .map_err(|e| async_graphql::Error::new(e.to_string()))
            }
        }
    })
}
