//! SELECT, INSERT, UPDATE and DELETE compilers.

use tracing::debug;

use super::{
    Compound, Dataset, Distinct, JoinClause, JoinCondition, JoinKind, LockStrength, LockWait,
    SetOperation,
};
use crate::dialect::{Dialect, LimitStyle, ModifyingJoins, OffsetWithoutLimit, SelectClause};
use crate::error::{QueryError, QueryResult};
use crate::expr::{Expr, IntoColumn};
use crate::render::Renderer;

/// Tables and predicate of a multi-table UPDATE or DELETE.
struct ModifyPlan<'a> {
    target: &'a Expr,
    from: Vec<&'a Expr>,
    joins: &'a [JoinClause],
    predicate: Option<Expr>,
}

fn strip_alias(table: &Expr) -> Expr {
    match table {
        Expr::Identifier { name, table, .. } => Expr::Identifier {
            name: name.clone(),
            table: table.clone(),
            alias: None,
        },
        other => other.clone(),
    }
}

fn split_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> (Vec<String>, Vec<Expr>)
where
    K: Into<String>,
    V: Into<Expr>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).unzip()
}

impl Dataset {
    // ============== SELECT ==============

    /// Compile to a SELECT statement.
    pub fn select_sql(&self) -> QueryResult<String> {
        let mut renderer = Renderer::new(&self.dialect);
        let mut out = String::new();
        self.write_select(&mut renderer, &mut out)?;
        debug!(dialect = self.dialect.name, sql = %out, "Compiled SELECT");
        Ok(out)
    }

    pub(crate) fn write_select(&self, r: &mut Renderer<'_>, out: &mut String) -> QueryResult<()> {
        if let Some(sql) = &self.raw_sql {
            out.push_str(sql);
            return Ok(());
        }

        let dialect = r.dialect();
        self.validate_select(dialect)?;

        let mut sql = String::new();
        for clause in dialect.select_order {
            match clause {
                SelectClause::Select => self.write_select_clause(r, &mut sql)?,
                SelectClause::From => {
                    if !self.source.is_empty() {
                        sql.push_str(" FROM ");
                        r.write_table_list(&mut sql, &self.source)?;
                    }
                }
                SelectClause::Join => self.write_joins(r, &mut sql, &self.joins)?,
                SelectClause::Where => {
                    if let Some(predicate) = &self.predicate {
                        sql.push_str(" WHERE ");
                        r.write_expr(&mut sql, predicate)?;
                    }
                }
                SelectClause::Group => {
                    if !self.grouping.is_empty() {
                        sql.push_str(" GROUP BY ");
                        r.write_list(&mut sql, &self.grouping)?;
                    }
                }
                SelectClause::Having => {
                    if let Some(having) = &self.having {
                        sql.push_str(" HAVING ");
                        r.write_expr(&mut sql, having)?;
                    }
                }
                SelectClause::Order => {
                    if !self.ordering.is_empty() {
                        sql.push_str(" ORDER BY ");
                        r.write_list(&mut sql, &self.ordering)?;
                    } else if dialect.limit_style == LimitStyle::Top && self.offset.is_some() {
                        // OFFSET ... FETCH is only valid after an ORDER BY.
                        sql.push_str(" ORDER BY (SELECT NULL)");
                    }
                }
                SelectClause::Limit => self.write_limit(dialect, &mut sql)?,
                SelectClause::Lock => self.write_lock(&mut sql),
                SelectClause::Compounds => {
                    for compound in &self.compounds {
                        self.write_compound(r, &mut sql, compound)?;
                    }
                }
            }
        }

        out.push_str(sql.trim_start());
        Ok(())
    }

    fn validate_select(&self, dialect: &Dialect) -> QueryResult<()> {
        if self.having.is_some() && self.grouping.is_empty() && !self.force_having {
            return Err(QueryError::invalid_operation(
                "HAVING",
                "HAVING requires a GROUP BY clause",
            ));
        }

        if matches!(self.distinct, Some(Distinct::On(_))) && !dialect.supports_distinct_on {
            return Err(QueryError::unsupported_clause("DISTINCT ON", dialect.name));
        }

        if let Some(lock) = self.lock_mode {
            let (clause, supported) = match lock.strength {
                LockStrength::Update => ("FOR UPDATE", dialect.locks.update),
                LockStrength::Share => ("FOR SHARE", dialect.locks.share),
            };
            if !supported {
                return Err(QueryError::unsupported_clause(clause, dialect.name));
            }
            let wait = match lock.wait {
                LockWait::Wait => None,
                LockWait::NoWait => Some(("NOWAIT", dialect.locks.nowait)),
                LockWait::SkipLocked => Some(("SKIP LOCKED", dialect.locks.skip_locked)),
            };
            if let Some((clause, false)) = wait {
                return Err(QueryError::unsupported_clause(clause, dialect.name));
            }
        }

        let ops = dialect.set_operations;
        for compound in &self.compounds {
            let keyword = set_operation_keyword(compound.op, dialect);
            let supported = match compound.op {
                SetOperation::Union => true,
                SetOperation::Intersect => ops.intersect,
                SetOperation::Except => ops.except,
            };
            if !supported {
                return Err(QueryError::unsupported_clause(keyword, dialect.name));
            }
            if compound.all && compound.op != SetOperation::Union && !ops.all {
                return Err(QueryError::unsupported_clause(
                    format!("{} ALL", keyword),
                    dialect.name,
                ));
            }
        }

        Ok(())
    }

    fn write_select_clause(&self, r: &mut Renderer<'_>, sql: &mut String) -> QueryResult<()> {
        sql.push_str("SELECT");
        match &self.distinct {
            Some(Distinct::All) => sql.push_str(" DISTINCT"),
            Some(Distinct::On(columns)) => {
                sql.push_str(" DISTINCT ON (");
                r.write_list(sql, columns)?;
                sql.push(')');
            }
            None => {}
        }
        if r.dialect().limit_style == LimitStyle::Top && self.offset.is_none() {
            if let Some(limit) = self.limit {
                sql.push_str(&format!(" TOP {}", limit));
            }
        }
        sql.push(' ');
        match &self.selection {
            Some(columns) => r.write_list(sql, columns)?,
            None => sql.push('*'),
        }
        Ok(())
    }

    fn write_joins(
        &self,
        r: &mut Renderer<'_>,
        sql: &mut String,
        joins: &[JoinClause],
    ) -> QueryResult<()> {
        for join in joins {
            sql.push(' ');
            sql.push_str(join.kind.as_sql());
            sql.push(' ');
            r.write_table(sql, &join.table)?;
            match &join.condition {
                JoinCondition::None => {}
                JoinCondition::On(on) => {
                    sql.push_str(" ON ");
                    r.write_expr(sql, on)?;
                }
                JoinCondition::Using(columns) => {
                    let columns: Vec<String> = columns.iter().map(|c| r.ident(c)).collect();
                    sql.push_str(" USING (");
                    sql.push_str(&columns.join(", "));
                    sql.push(')');
                }
            }
        }
        Ok(())
    }

    fn write_limit(&self, dialect: &Dialect, sql: &mut String) -> QueryResult<()> {
        match (dialect.limit_style, self.limit, self.offset) {
            (_, None, None) => {}
            (LimitStyle::LimitOffset, Some(limit), offset) => {
                sql.push_str(&format!(" LIMIT {}", limit));
                if let Some(offset) = offset {
                    sql.push_str(&format!(" OFFSET {}", offset));
                }
            }
            (LimitStyle::LimitOffset, None, Some(offset)) => match dialect.offset_without_limit {
                OffsetWithoutLimit::Bare => sql.push_str(&format!(" OFFSET {}", offset)),
                OffsetWithoutLimit::Sentinel(limit) => {
                    sql.push_str(&format!(" {} OFFSET {}", limit, offset))
                }
                OffsetWithoutLimit::Unsupported => {
                    return Err(QueryError::unsupported_clause(
                        "OFFSET without LIMIT",
                        dialect.name,
                    ));
                }
            },
            (LimitStyle::OffsetFetch, Some(limit), None) => {
                sql.push_str(&format!(" FETCH FIRST {} ROWS ONLY", limit))
            }
            // TOP was already written in the SELECT clause.
            (LimitStyle::Top, Some(_), None) => {}
            (LimitStyle::OffsetFetch | LimitStyle::Top, limit, Some(offset)) => {
                sql.push_str(&format!(" OFFSET {} ROWS", offset));
                if let Some(limit) = limit {
                    sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", limit));
                }
            }
        }
        Ok(())
    }

    fn write_lock(&self, sql: &mut String) {
        if let Some(lock) = self.lock_mode {
            sql.push_str(match lock.strength {
                LockStrength::Update => " FOR UPDATE",
                LockStrength::Share => " FOR SHARE",
            });
            sql.push_str(match lock.wait {
                LockWait::Wait => "",
                LockWait::NoWait => " NOWAIT",
                LockWait::SkipLocked => " SKIP LOCKED",
            });
        }
    }

    fn write_compound(
        &self,
        r: &mut Renderer<'_>,
        sql: &mut String,
        compound: &Compound,
    ) -> QueryResult<()> {
        sql.push(' ');
        sql.push_str(set_operation_keyword(compound.op, r.dialect()));
        if compound.all {
            sql.push_str(" ALL");
        }
        sql.push(' ');
        compound.dataset.write_select(r, sql)
    }

    // ============== INSERT ==============

    /// Compile a single-row INSERT from column/value pairs. No pairs inserts
    /// a row of defaults.
    pub fn insert_sql<K, V>(&self, row: impl IntoIterator<Item = (K, V)>) -> QueryResult<String>
    where
        K: Into<String>,
        V: Into<Expr>,
    {
        let (columns, values) = split_pairs(row);
        let mut renderer = Renderer::new(&self.dialect);
        let mut out = String::new();
        self.write_insert(&mut renderer, &mut out, &columns, std::slice::from_ref(&values))?;
        debug!(dialect = self.dialect.name, sql = %out, "Compiled INSERT");
        Ok(out)
    }

    /// Compile a multi-row INSERT.
    ///
    /// Dialects with multi-row VALUES get one statement; others get one
    /// statement per row. No rows yields no statements.
    pub fn insert_many_sql<C, R, V>(
        &self,
        columns: impl IntoIterator<Item = C>,
        rows: impl IntoIterator<Item = R>,
    ) -> QueryResult<Vec<String>>
    where
        C: Into<String>,
        R: IntoIterator<Item = V>,
        V: Into<Expr>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let rows: Vec<Vec<Expr>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<&[Vec<Expr>]> = if self.dialect.supports_multi_row_insert {
            vec![&rows[..]]
        } else {
            rows.chunks(1).collect()
        };

        let mut statements = Vec::with_capacity(batches.len());
        for batch in batches {
            let mut renderer = Renderer::new(&self.dialect);
            let mut out = String::new();
            self.write_insert(&mut renderer, &mut out, &columns, batch)?;
            statements.push(out);
        }
        debug!(
            dialect = self.dialect.name,
            rows = rows.len(),
            statements = statements.len(),
            "Compiled multi-row INSERT"
        );
        Ok(statements)
    }

    /// Compile `INSERT INTO table (columns) SELECT ...`. An empty column list
    /// omits the column list.
    pub fn insert_select_sql<I>(&self, columns: I, source: &Dataset) -> QueryResult<String>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        if let Some(sql) = &self.raw_sql {
            return Ok(sql.clone());
        }
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut renderer = Renderer::new(&self.dialect);
        let mut out = String::new();
        self.write_insert_target(&mut renderer, &mut out, "INSERT")?;
        if !columns.is_empty() {
            out.push_str(" (");
            out.push_str(&self.column_list(&renderer, &columns));
            out.push(')');
        }
        out.push(' ');
        source.write_select(&mut renderer, &mut out)?;
        self.write_returning(&mut renderer, &mut out)?;
        debug!(dialect = self.dialect.name, sql = %out, "Compiled INSERT ... SELECT");
        Ok(out)
    }

    pub(crate) fn write_insert(
        &self,
        r: &mut Renderer<'_>,
        out: &mut String,
        columns: &[String],
        rows: &[Vec<Expr>],
    ) -> QueryResult<()> {
        if let Some(sql) = &self.raw_sql {
            out.push_str(sql);
            return Ok(());
        }
        for row in rows {
            if row.len() != columns.len() {
                return Err(QueryError::invalid_operation(
                    "INSERT",
                    format!("row has {} values for {} columns", row.len(), columns.len()),
                ));
            }
        }

        self.write_insert_target(r, out, "INSERT")?;
        let dialect = r.dialect();
        if columns.is_empty() {
            let suffix = dialect
                .empty_insert
                .ok_or_else(|| QueryError::unsupported_clause("INSERT of defaults", dialect.name))?;
            out.push(' ');
            out.push_str(suffix);
        } else {
            out.push_str(" (");
            out.push_str(&self.column_list(r, columns));
            out.push_str(") VALUES ");
            for (i, row) in rows.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push('(');
                r.write_list(out, row)?;
                out.push(')');
            }
        }
        self.write_returning(r, out)
    }

    fn write_insert_target(
        &self,
        r: &mut Renderer<'_>,
        out: &mut String,
        statement: &str,
    ) -> QueryResult<()> {
        let table = match self.source.as_slice() {
            [table @ Expr::Identifier { .. }] => strip_alias(table),
            _ => {
                return Err(QueryError::invalid_operation(
                    statement,
                    "INSERT requires exactly one source table",
                ));
            }
        };
        self.check_returning(r.dialect())?;
        out.push_str("INSERT INTO ");
        r.write_expr(out, &table)
    }

    fn column_list(&self, r: &Renderer<'_>, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| r.ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn check_returning(&self, dialect: &Dialect) -> QueryResult<()> {
        if !self.returning.is_empty() && !dialect.supports_returning {
            return Err(QueryError::unsupported_clause("RETURNING", dialect.name));
        }
        Ok(())
    }

    fn write_returning(&self, r: &mut Renderer<'_>, out: &mut String) -> QueryResult<()> {
        if !self.returning.is_empty() {
            out.push_str(" RETURNING ");
            r.write_list(out, &self.returning)?;
        }
        Ok(())
    }

    // ============== UPDATE / DELETE ==============

    /// Compile an UPDATE setting column/value pairs.
    pub fn update_sql<K, V>(&self, values: impl IntoIterator<Item = (K, V)>) -> QueryResult<String>
    where
        K: Into<String>,
        V: Into<Expr>,
    {
        let values: Vec<(String, Expr)> =
            values.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let mut renderer = Renderer::new(&self.dialect);
        let mut out = String::new();
        self.write_update(&mut renderer, &mut out, &values)?;
        debug!(dialect = self.dialect.name, sql = %out, "Compiled UPDATE");
        Ok(out)
    }

    /// Compile a DELETE.
    pub fn delete_sql(&self) -> QueryResult<String> {
        let mut renderer = Renderer::new(&self.dialect);
        let mut out = String::new();
        self.write_delete(&mut renderer, &mut out)?;
        debug!(dialect = self.dialect.name, sql = %out, "Compiled DELETE");
        Ok(out)
    }

    fn is_multi_table(&self) -> bool {
        self.source.len() > 1 || !self.joins.is_empty()
    }

    fn check_modification(&self, statement: &str, dialect: &Dialect) -> QueryResult<()> {
        if self.is_grouped() {
            return Err(QueryError::invalid_operation(
                statement,
                "grouped datasets cannot be updated or deleted",
            ));
        }
        if !self.compounds.is_empty() {
            return Err(QueryError::invalid_operation(
                statement,
                "datasets with set operations cannot be updated or deleted",
            ));
        }
        if self.source.is_empty() {
            return Err(QueryError::invalid_operation(statement, "no source table"));
        }
        if self.is_multi_table() && dialect.modifying_joins == ModifyingJoins::Unsupported {
            return Err(QueryError::invalid_operation(
                statement,
                format!(
                    "{} over more than one table is not supported by the {} dialect",
                    statement, dialect.name
                ),
            )
            .with_dialect(dialect.name));
        }
        if self.limit.is_some() {
            if !dialect.supports_modify_limit {
                return Err(QueryError::unsupported_clause(
                    format!("LIMIT in {}", statement),
                    dialect.name,
                ));
            }
            if self.is_multi_table() {
                return Err(QueryError::unsupported_clause(
                    format!("LIMIT in multi-table {}", statement),
                    dialect.name,
                ));
            }
        }
        if self.offset.is_some() {
            return Err(QueryError::unsupported_clause(
                format!("OFFSET in {}", statement),
                dialect.name,
            ));
        }
        self.check_returning(dialect)
    }

    /// Split the sources of a multi-table statement into the modified table
    /// and the tables it reads from. With `USING`-style dialects and a single
    /// source, the first inner join supplies the second table and its join
    /// condition moves into the WHERE clause.
    fn modify_plan(&self, statement: &str, dialect: &Dialect) -> QueryResult<ModifyPlan<'_>> {
        let (target, rest) = self
            .source
            .split_first()
            .ok_or_else(|| QueryError::invalid_operation(statement, "no source table"))?;
        let mut plan = ModifyPlan {
            target,
            from: rest.iter().collect(),
            joins: &self.joins,
            predicate: self.predicate.clone(),
        };

        if dialect.modifying_joins == ModifyingJoins::Using && plan.from.is_empty() {
            if let Some((first, remaining)) = self.joins.split_first() {
                let on = match (&first.kind, &first.condition) {
                    (JoinKind::Inner | JoinKind::Cross, JoinCondition::On(on)) => Some(on.clone()),
                    (JoinKind::Inner | JoinKind::Cross, JoinCondition::None) => None,
                    _ => {
                        return Err(QueryError::invalid_operation(
                            statement,
                            "the first joined table must be an inner join with an ON condition",
                        )
                        .with_dialect(dialect.name));
                    }
                };
                plan.from.push(&first.table);
                plan.joins = remaining;
                plan.predicate = Expr::and_all(on.into_iter().chain(plan.predicate));
            }
        }
        Ok(plan)
    }

    fn write_where(
        &self,
        r: &mut Renderer<'_>,
        out: &mut String,
        predicate: Option<&Expr>,
    ) -> QueryResult<()> {
        if let Some(predicate) = predicate {
            out.push_str(" WHERE ");
            r.write_expr(out, predicate)?;
        }
        Ok(())
    }

    fn write_modify_tail(&self, r: &mut Renderer<'_>, out: &mut String) -> QueryResult<()> {
        let dialect = r.dialect();
        if dialect.supports_modify_limit && !self.is_multi_table() {
            if !self.ordering.is_empty() {
                out.push_str(" ORDER BY ");
                r.write_list(out, &self.ordering)?;
            }
            if let Some(limit) = self.limit {
                out.push_str(&format!(" LIMIT {}", limit));
            }
        }
        self.write_returning(r, out)
    }

    pub(crate) fn write_update(
        &self,
        r: &mut Renderer<'_>,
        out: &mut String,
        values: &[(String, Expr)],
    ) -> QueryResult<()> {
        if let Some(sql) = &self.raw_sql {
            out.push_str(sql);
            return Ok(());
        }
        let dialect = r.dialect();
        self.check_modification("UPDATE", dialect)?;
        if values.is_empty() {
            return Err(QueryError::invalid_operation("UPDATE", "no columns to set"));
        }
        let plan = self.modify_plan("UPDATE", dialect)?;

        out.push_str("UPDATE ");
        r.write_table(out, plan.target)?;
        if self.is_multi_table() && dialect.modifying_joins == ModifyingJoins::Join {
            for table in &plan.from {
                out.push_str(", ");
                r.write_table(out, table)?;
            }
            self.write_joins(r, out, plan.joins)?;
        }

        out.push_str(" SET ");
        for (i, (column, value)) in values.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            r.write_expr(out, &column.as_str().into_column())?;
            out.push_str(" = ");
            r.write_expr(out, value)?;
        }

        if self.is_multi_table() && dialect.modifying_joins == ModifyingJoins::Using {
            out.push_str(" FROM ");
            for (i, table) in plan.from.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                r.write_table(out, table)?;
            }
            self.write_joins(r, out, plan.joins)?;
        }

        self.write_where(r, out, plan.predicate.as_ref())?;
        self.write_modify_tail(r, out)
    }

    pub(crate) fn write_delete(&self, r: &mut Renderer<'_>, out: &mut String) -> QueryResult<()> {
        if let Some(sql) = &self.raw_sql {
            out.push_str(sql);
            return Ok(());
        }
        let dialect = r.dialect();
        self.check_modification("DELETE", dialect)?;
        let plan = self.modify_plan("DELETE", dialect)?;

        if !self.is_multi_table() {
            out.push_str("DELETE FROM ");
            r.write_table(out, plan.target)?;
        } else if dialect.modifying_joins == ModifyingJoins::Using {
            out.push_str("DELETE FROM ");
            r.write_table(out, plan.target)?;
            out.push_str(" USING ");
            for (i, table) in plan.from.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                r.write_table(out, table)?;
            }
            self.write_joins(r, out, plan.joins)?;
        } else {
            // DELETE target FROM target, other JOIN ...
            out.push_str("DELETE ");
            match plan.target.alias_name() {
                Some(alias) => out.push_str(&r.ident(alias)),
                None => r.write_table(out, plan.target)?,
            }
            out.push_str(" FROM ");
            r.write_table_list(out, &self.source)?;
            self.write_joins(r, out, plan.joins)?;
        }

        self.write_where(r, out, plan.predicate.as_ref())?;
        self.write_modify_tail(r, out)
    }
}

fn set_operation_keyword(op: SetOperation, dialect: &Dialect) -> &'static str {
    match op {
        SetOperation::Union => "UNION",
        SetOperation::Intersect => "INTERSECT",
        SetOperation::Except => dialect.set_operations.except_keyword,
    }
}
