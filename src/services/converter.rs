//! 富文本编辑器状态转换引擎
//! 将 Lexical 编辑器序列化的 JSON 树转换为 Markdown，供课文内容存储与展示

use anyhow::{Context, Result};
use log::warn;
use pulldown_cmark::{html, Options, Parser};
use serde::{Deserialize, Serialize};

/// 课文内容的默认类型
pub const CONTENT_TYPE_TEXT: &str = "text";

/// 文本格式位掩码
const FORMAT_BOLD: u32 = 1;
const FORMAT_ITALIC: u32 = 2;
const FORMAT_CODE: u32 = 8;

/// 编辑器节点（上游保证树有限无环，这里不做假设，缺字段一律按空处理）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorNode {
    #[serde(rename = "type")]
    pub node_type: String,
    pub children: Option<Vec<EditorNode>>,
    pub tag: Option<String>,
    pub list_type: Option<String>,
    pub language: Option<String>,
    pub text: Option<String>,
    pub format: u32,
    pub url: Option<String>,
}

/// 编辑器序列化文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorState {
    pub root: Option<EditorNode>,
}

/// 待写入 lesson_contents 的内容载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonContentPayload {
    pub content_type: String,
    pub content: String,
}

/// 解析编辑器 JSON 并转换为 Markdown
pub fn convert_editor_state(raw: &str) -> Result<String> {
    let state: EditorState =
        serde_json::from_str(raw).context("无法解析编辑器状态 JSON")?;
    Ok(convert_document(&state))
}

/// 顶层块之间以空行连接，首尾空白裁掉；缺少 root.children 时返回空串
pub fn convert_document(state: &EditorState) -> String {
    let Some(children) = state.root.as_ref().and_then(|root| root.children.as_ref())
    else {
        return String::new();
    };

    let mut markdown = String::new();
    for node in children {
        markdown.push_str(&process_node(node));
        markdown.push_str("\n\n");
    }

    markdown.trim().to_string()
}

fn process_node(node: &EditorNode) -> String {
    match node.node_type.as_str() {
        "paragraph" => process_children(node.children.as_deref()),
        "heading" => {
            let tag = node.tag.as_deref().unwrap_or("h1");
            let level: usize = tag.trim_start_matches('h').parse().unwrap_or(0);
            format!(
                "{} {}",
                "#".repeat(level),
                process_children(node.children.as_deref())
            )
        }
        "list" => {
            let numbered = node.list_type.as_deref() == Some("number");
            let mut text = String::new();
            for (index, item) in node
                .children
                .as_deref()
                .unwrap_or_default()
                .iter()
                .enumerate()
            {
                if numbered {
                    text.push_str(&format!("{}. {}\n", index + 1, process_node(item)));
                } else {
                    text.push_str(&format!("- {}\n", process_node(item)));
                }
            }
            text.trim_end().to_string()
        }
        // 列表项本身不带记号，记号由父级 list 添加
        "listitem" => process_children(node.children.as_deref()),
        "quote" => {
            let quoted = process_children(node.children.as_deref());
            format!("> {}", quoted.replace('\n', "\n> "))
        }
        "code" => {
            let language = node.language.as_deref().unwrap_or("");
            format!(
                "```{}\n{}\n```",
                language,
                process_children(node.children.as_deref())
            )
        }
        "text" => apply_text_format(node),
        "link" => {
            let url = node.url.as_deref().unwrap_or("");
            format!("[{}]({})", process_children(node.children.as_deref()), url)
        }
        // 未知节点：有子节点就继续下钻，否则不贡献内容
        _ => process_children(node.children.as_deref()),
    }
}

fn process_children(children: Option<&[EditorNode]>) -> String {
    let mut text = String::new();
    for child in children.unwrap_or_default() {
        text.push_str(&process_node(child));
    }
    text
}

/// 包裹顺序固定为 粗体 -> 斜体 -> 行内代码，逐层包住前一层结果
fn apply_text_format(node: &EditorNode) -> String {
    let mut text = node.text.clone().unwrap_or_default();
    if node.format & FORMAT_BOLD != 0 {
        text = format!("**{}**", text);
    }
    if node.format & FORMAT_ITALIC != 0 {
        text = format!("*{}*", text);
    }
    if node.format & FORMAT_CODE != 0 {
        text = format!("`{}`", text);
    }
    text
}

/// 转换失败不致命：任何解析错误都回退为原始内容按纯文本保存
pub fn lesson_content_from_editor_state(raw: &str) -> LessonContentPayload {
    match convert_editor_state(raw) {
        Ok(markdown) => LessonContentPayload {
            content_type: CONTENT_TYPE_TEXT.to_string(),
            content: markdown,
        },
        Err(err) => {
            warn!("编辑器状态解析失败，按纯文本保存: {err:#}");
            LessonContentPayload {
                content_type: CONTENT_TYPE_TEXT.to_string(),
                content: raw.to_string(),
            }
        }
    }
}

/// 将存储的 Markdown 渲染为 HTML（展示路径）
pub fn render_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    html_output
}
