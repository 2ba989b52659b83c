//! Demo application route table

use pocket_core::handlers::{calculator, cpf};
use pocket_core::{
    AccessLog, BodyLimit, BodyLimitConfig, Collection, Dispatcher, FieldKind, FieldSpec,
    ResourceSchema, Result,
};

/// Task list with an auto id
pub fn tarefa_schema() -> ResourceSchema {
    ResourceSchema::new("tarefa", "tarefas", "Tarefa")
        .field(FieldSpec::required("titulo", FieldKind::Text))
        .field(FieldSpec::with_default("concluida", FieldKind::Boolean, false))
        .deleted_message("Tarefa deletada com sucesso")
        .not_found_message("Tarefa não encontrada")
        .duplicate_message("Tarefa já cadastrada")
}

/// Users keyed by email
pub fn usuario_schema() -> ResourceSchema {
    ResourceSchema::new("usuario", "usuarios", "Usuário")
        .natural_key("email")
        .field(FieldSpec::required("nome", FieldKind::Text))
        .field(FieldSpec::optional("idade", FieldKind::Integer))
}

/// Build the dispatcher with fresh, empty collections
pub fn build_dispatcher(max_body_size: usize) -> Result<Dispatcher> {
    let mut dispatcher = Dispatcher::new();

    dispatcher
        .with_middleware(AccessLog::default())
        .with_middleware(BodyLimit::new(BodyLimitConfig::new(max_body_size)));

    dispatcher
        .resource(Collection::shared(tarefa_schema()))?
        .resource(Collection::shared(usuario_schema()))?
        .get("/validar-cpf", cpf::validate)?
        .post("/validar-cpf", cpf::validate)?
        .get("/calcular", calculator::calculate_operation)?;

    tracing::debug!(routes = dispatcher.route_count(), "dispatcher built");
    Ok(dispatcher)
}
