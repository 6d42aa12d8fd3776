use xiyan_core::Dialect;
use xiyan_llm::ChatMessage;

pub(crate) fn generation_messages(dialect: Dialect, schema: &str, question: &str) -> Vec<ChatMessage> {
    let system = format!(
        "你现在是一名{dialect}数据分析专家，你的任务是根据参考的数据库schema和用户的问题，\
         编写正确的SQL来回答用户的问题，生成的SQL用```sql 和```包围起来。\n\
         【数据库schema】\n{schema}\n\n【问题】\n{question}\n"
    );
    vec![ChatMessage::system(system), ChatMessage::user(format!("用户的问题是: {question}"))]
}

pub(crate) fn repair_messages(
    dialect: Dialect,
    schema: &str,
    question: &str,
    sql: &str,
    error: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        "现在你是一个{dialect}数据分析专家，需要阅读一个客户的问题，参考的数据库schema，\
         该问题对应的待检查SQL，以及执行该SQL时数据库返回的语法错误，\
         请你仅针对其中的语法错误进行修复，输出修复后的SQL。\n\
         注意：\n\
         1、仅修复语法错误，不允许改变SQL的逻辑。\n\
         2、生成的SQL用```sql 和```包围起来。\n\n\
         【数据库schema】\n{schema}\n"
    );
    let user = format!("【问题】\n{question}\n\n【待检查SQL】\n{sql}\n\n【错误信息】\n{error}");
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}
