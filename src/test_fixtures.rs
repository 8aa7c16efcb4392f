//! Shared schema and ruleset used by unit and integration tests.
#![allow(dead_code)]

use prost_reflect::DescriptorPool;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet, MethodDescriptorProto, ServiceDescriptorProto,
};

/// Rules over the `demo.v1.Items` service. Order matters: verb-suffixed
/// routes come before the plain `{id}` route.
pub const DEMO_RULESET: &str = r#"
[[rules]]
selector = "demo.v1.Items.Download"
method = "GET"
pattern = "/v1/items/{id}:download"

[[rules]]
selector = "demo.v1.Items.DownloadStream"
method = "GET"
pattern = "/v1/items/{id}:stream"

[[rules]]
selector = "demo.v1.Items.WatchItems"
method = "GET"
pattern = "/v1/items:watch"

[[rules]]
selector = "demo.v1.Items.GetItem"
method = "GET"
pattern = "/v1/items/{id}"

[[rules]]
selector = "demo.v1.Items.GetItem"
method = "GET"
pattern = "/v1/items/{id}/revisions/{revision}"

[[rules]]
selector = "demo.v1.Items.CreateItem"
method = "POST"
pattern = "/v1/{parent=shelves/*}/items"
body = "item"

[[rules]]
selector = "demo.v1.Items.CreateItem"
method = "POST"
pattern = "/v1/items"
body = "*"

[[rules]]
selector = "demo.v1.Items.ListItems"
method = "GET"
pattern = "/v1/items"

[[rules]]
selector = "demo.v1.Items.Upload"
method = "PUT"
pattern = "/v1/items/{id}/content"
body = "file"
"#;

pub fn demo_pool() -> DescriptorPool {
    DescriptorPool::from_file_descriptor_set(demo_file_set()).expect("demo descriptors are valid")
}

pub fn demo_file_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![http_body_file(), items_file()],
    }
}

fn http_body_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("google/api/httpbody.proto".into()),
        package: Some("google.api".into()),
        syntax: Some("proto3".into()),
        message_type: vec![message(
            "HttpBody",
            vec![
                scalar("content_type", 1, Type::String),
                scalar("data", 2, Type::Bytes),
            ],
        )],
        ..Default::default()
    }
}

fn items_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("demo/v1/items.proto".into()),
        package: Some("demo.v1".into()),
        syntax: Some("proto3".into()),
        dependency: vec!["google/api/httpbody.proto".into()],
        enum_type: vec![EnumDescriptorProto {
            name: Some("Color".into()),
            value: ["COLOR_UNSPECIFIED", "RED", "BLUE"]
                .iter()
                .enumerate()
                .map(|(number, name)| EnumValueDescriptorProto {
                    name: Some((*name).into()),
                    number: Some(number as i32),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }],
        message_type: vec![
            message(
                "GetItemRequest",
                vec![
                    scalar("id", 1, Type::String),
                    scalar("verbose", 2, Type::Bool),
                    named("color", 3, Type::Enum, ".demo.v1.Color"),
                    scalar("revision", 4, Type::Int32),
                ],
            ),
            message(
                "Item",
                vec![
                    scalar("name", 1, Type::String),
                    scalar("count", 2, Type::Int64),
                    repeated(scalar("tags", 3, Type::String)),
                    named("color", 4, Type::Enum, ".demo.v1.Color"),
                ],
            ),
            message(
                "CreateItemRequest",
                vec![
                    scalar("parent", 1, Type::String),
                    named("item", 2, Type::Message, ".demo.v1.Item"),
                ],
            ),
            message("Filter", vec![scalar("owner", 1, Type::String)]),
            message(
                "ListItemsRequest",
                vec![
                    scalar("page_size", 1, Type::Int32),
                    repeated(scalar("tags", 2, Type::String)),
                    named("color", 3, Type::Enum, ".demo.v1.Color"),
                    named("filter", 4, Type::Message, ".demo.v1.Filter"),
                ],
            ),
            message(
                "ListItemsResponse",
                vec![
                    repeated(named("items", 1, Type::Message, ".demo.v1.Item")),
                    scalar("next_page_token", 2, Type::String),
                ],
            ),
            message("DownloadRequest", vec![scalar("id", 1, Type::String)]),
            message(
                "UploadRequest",
                vec![
                    scalar("id", 1, Type::String),
                    named("file", 2, Type::Message, ".google.api.HttpBody"),
                ],
            ),
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("Items".into()),
            method: vec![
                rpc("GetItem", "GetItemRequest", ".demo.v1.Item", false, false),
                rpc("CreateItem", "CreateItemRequest", ".demo.v1.Item", false, false),
                rpc("ListItems", "ListItemsRequest", ".demo.v1.ListItemsResponse", false, false),
                rpc("Download", "DownloadRequest", ".google.api.HttpBody", false, false),
                rpc("DownloadStream", "DownloadRequest", ".google.api.HttpBody", false, true),
                rpc("WatchItems", "ListItemsRequest", ".demo.v1.Item", false, true),
                rpc("Upload", "UploadRequest", ".demo.v1.Item", false, false),
                rpc("Chat", "GetItemRequest", ".demo.v1.Item", true, false),
            ],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn message(name: &str, field: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.into()),
        field,
        ..Default::default()
    }
}

fn scalar(name: &str, number: i32, kind: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.into()),
        json_name: Some(json_name(name)),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(kind as i32),
        ..Default::default()
    }
}

fn named(name: &str, number: i32, kind: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.into()),
        ..scalar(name, number, kind)
    }
}

fn repeated(field: FieldDescriptorProto) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        ..field
    }
}

fn rpc(name: &str, input: &str, output: &str, client_streaming: bool, server_streaming: bool) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.into()),
        input_type: Some(format!(".demo.v1.{}", input)),
        output_type: Some(output.into()),
        client_streaming: Some(client_streaming),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}

fn json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
